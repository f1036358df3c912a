pub mod enroll;
pub mod inspect;
pub mod serve;
