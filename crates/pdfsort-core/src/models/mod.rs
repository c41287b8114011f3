pub mod record;
pub mod work_item;

pub use record::*;
pub use work_item::*;
