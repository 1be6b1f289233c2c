pub mod booking;
pub mod movie;
pub mod seat_status;
pub mod show;
pub mod theater;
pub mod user;

pub use booking::{Booking, BookingState, PaymentState};
pub use movie::Movie;
pub use seat_status::SeatStatus;
pub use show::Show;
pub use theater::{Theater, TheaterSection};
pub use user::User;
