pub mod id_allocator;
pub mod relational;

pub use id_allocator::IdAllocator;
pub use relational::RelationalStore;
