pub mod audit;
pub mod review;
pub mod run;
