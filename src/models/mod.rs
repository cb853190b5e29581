pub mod enums;
pub mod filters;
pub mod patient;
pub mod report;
pub mod run;
pub mod schedule;
pub mod staff;

pub use enums::*;
pub use filters::*;
pub use patient::*;
pub use report::*;
pub use run::*;
pub use schedule::*;
pub use staff::*;
