use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ndarray::{Array1, Array2};
use ndarray_npy::{write_npy, NpzReader};

use tv_recon_core::{ChambollePock, GradientOperator, Image, MatrixProjector, SolverParams};

/// Chambolle-Pock reconstruction CLI.
///
/// Expected NPZ file structure:
///   - key "sinogram":      1D array (M,) of f32
///   - key "weights":       1D array (M,) of f32
///   - key "system_matrix": 2D array (M, N) of f32, N = width * height
///
/// Hyperparameters come from the flags below, or wholesale from a JSON
/// file matching `SolverParams` when --params is given.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to NPZ file containing sinogram, weights and system_matrix
    #[arg(long)]
    data: PathBuf,

    /// Image width in pixels
    #[arg(long)]
    width: usize,

    /// Image height in pixels
    #[arg(long)]
    height: usize,

    /// Optional JSON file with the full solver parameter set
    #[arg(long)]
    params: Option<PathBuf>,

    /// Dual-ball radius (regularization strength)
    #[arg(long, default_value_t = 1.0)]
    beta: f32,

    /// Primal step size
    #[arg(long, default_value_t = 0.1)]
    tau: f32,

    /// Dual step size
    #[arg(long, default_value_t = 0.1)]
    sigma: f32,

    /// Extrapolation factor
    #[arg(long, default_value_t = 1.0)]
    theta: f32,

    /// Number of outer iterations
    #[arg(long, default_value_t = 50)]
    n_iter: usize,

    /// Number of inner fixed-point iterations
    #[arg(long, default_value_t = 5)]
    n_inner_iter: usize,

    /// Output path for the reconstructed image (.npy)
    #[arg(long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // --- Load sinogram, weights and system matrix from NPZ ---
    let file = File::open(&args.data)
        .map_err(|e| anyhow::anyhow!("Failed to open NPZ {:?}: {}", args.data, e))?;
    let mut npz = NpzReader::new(file)
        .map_err(|e| anyhow::anyhow!("Failed to read NPZ {:?}: {}", args.data, e))?;

    let sinogram: Array1<f32> = npz
        .by_name("sinogram")
        .map_err(|e| anyhow::anyhow!("Missing or invalid 'sinogram' array in NPZ: {}", e))?;

    let weights: Array1<f32> = npz
        .by_name("weights")
        .map_err(|e| anyhow::anyhow!("Missing or invalid 'weights' array in NPZ: {}", e))?;

    let system_matrix: Array2<f32> = npz
        .by_name("system_matrix")
        .map_err(|e| anyhow::anyhow!("Missing or invalid 'system_matrix' array in NPZ: {}", e))?;

    // --- Solver parameters: JSON file wins over individual flags ---
    let params = match &args.params {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open params JSON {:?}: {}", path, e))?;
            serde_json::from_reader(file)
                .map_err(|e| anyhow::anyhow!("Failed to parse params JSON {:?}: {}", path, e))?
        }
        None => SolverParams {
            beta: args.beta,
            tau: args.tau,
            sigma: args.sigma,
            theta: args.theta,
            n_iter: args.n_iter,
            n_inner_iter: args.n_inner_iter,
            tol: None,
        },
    };

    println!(
        "Running Chambolle-Pock with M = {}, N = {}, image = {}x{}, beta = {}, tau = {}, sigma = {}, n_iter = {}",
        system_matrix.dim().0,
        system_matrix.dim().1,
        args.width,
        args.height,
        params.beta,
        params.tau,
        params.sigma,
        params.n_iter
    );

    // --- Run the reconstruction ---
    let projector = MatrixProjector::new(system_matrix, (args.height, args.width))?;
    let solver = ChambollePock::new(&projector, &GradientOperator);
    let x0 = Image::zeros((args.height, args.width));
    let image = solver.solve(&x0, &sinogram, &weights, &params)?;

    // --- Save image as .npy ---
    write_npy(&args.output, &image)
        .map_err(|e| anyhow::anyhow!("Failed to write output NPY {:?}: {}", args.output, e))?;

    println!("Reconstruction written to {:?}", args.output);

    Ok(())
}
