pub mod booking;
pub mod notification;
pub mod page;
pub mod review;
pub mod service;
pub mod user;

pub use booking::{Booking, BookingDraft, BookingFilters, BookingStatus, Party};
pub use notification::{Notification, NotificationDraft, NotificationType};
pub use page::{Page, Pagination};
pub use review::{RatingSummary, Review};
pub use service::{PriceType, Service, ServiceDraft};
pub use user::{Role, Session, User};
