pub mod account;
pub mod call;
pub mod lead;
pub mod load;
