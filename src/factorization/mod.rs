pub mod beta_divergence;
pub mod coordinate_descent;
pub mod multiplicative_update;
pub mod nmf;
pub mod params;
pub mod seeding;
