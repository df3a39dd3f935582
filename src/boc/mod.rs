mod bag_of_cells;
mod raw;

pub use bag_of_cells::BagOfCells;
