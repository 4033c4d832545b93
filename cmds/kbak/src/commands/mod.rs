pub mod backup;

pub mod util;
