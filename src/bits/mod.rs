mod bit_string;
mod builder;
mod reader;

pub use bit_string::BitString;
pub use builder::BitBuilder;
pub use reader::BitReader;
