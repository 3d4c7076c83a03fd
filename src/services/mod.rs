pub mod auth;
pub mod bookings;
pub mod calendar;
pub mod catalog;
pub mod lifecycle;
pub mod notifications;
pub mod pricing;
pub mod reviews;
pub mod scheduling;
