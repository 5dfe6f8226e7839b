pub mod actor;
pub mod genre;
pub mod hall;
pub mod performance;
pub mod play;
pub mod reservation;
pub mod user;

pub use actor::Actor;
pub use genre::Genre;
pub use hall::TheatreHall;
pub use performance::Performance;
pub use play::Play;
pub use reservation::{Reservation, Ticket};
pub use user::User;
