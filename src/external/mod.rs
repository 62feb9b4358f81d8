pub mod payments;

pub use payments::PaymentsService;
