// Export pipeline stages and the paced notification dispatcher

pub mod dispatch;
pub mod processing;
