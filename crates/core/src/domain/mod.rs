pub mod article;
pub mod contract;
pub mod recommendation;
pub mod report;
