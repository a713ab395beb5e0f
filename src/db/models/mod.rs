mod attendee;
mod validation;

pub use attendee::*;
pub use validation::*;
