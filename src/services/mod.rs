pub mod ai;
pub mod bookings;
pub mod calendar;
pub mod moderation;
pub mod outbox;
pub mod sections;
pub mod wizard;
