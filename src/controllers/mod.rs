pub mod bookings;
pub mod movies;
pub mod payment;
pub mod shows;
pub mod test;
pub mod theaters;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(test::routes())
        .merge(theaters::routes())
        .merge(movies::routes())
        .merge(shows::routes())
        .merge(bookings::routes())
        .merge(payment::routes())
}
