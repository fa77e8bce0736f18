use ndarray::array;
use whitened_pca::density::log_npdf_array;
use whitened_pca::{reduce, ReduceError};

fn main() {
    let training = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
    let test = array![[2.0, 3.0]];

    let (z_train, z_test) =
        reduce(training.view(), test.view(), 1).expect("whitened reduction failed");

    println!("Reduced training table {:?}:\n{:.4}", z_train.dim(), z_train);
    println!("Reduced test table {:?}:\n{:.4}", z_test.dim(), z_test);

    match reduce(training.view(), test.view(), 2) {
        Err(ReduceError::SingularValueUnderflow { component, singular_value, floor }) => println!(
            "k = 2 rejected: component {} has singular value {:e} (floor {:e})",
            component, singular_value, floor
        ),
        other => println!("k = 2 unexpectedly returned {:?}", other),
    }

    let scores = log_npdf_array(z_train.column(0), 0.0, 1.0).expect("unit variance is valid");
    println!("Standard-normal log-density of PC1 scores: {:.4}", scores);
}
