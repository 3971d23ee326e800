pub mod prospect;
