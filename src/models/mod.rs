pub mod dead_letter;
pub mod queue_item;

pub use dead_letter::DeadLetter;
pub use queue_item::QueueItem;
