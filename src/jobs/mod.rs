//! Background jobs

pub mod overdue;
