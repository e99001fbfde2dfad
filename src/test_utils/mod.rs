pub mod random_matrix;
