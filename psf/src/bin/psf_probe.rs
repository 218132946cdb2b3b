//! Inspect a PSF model at one position
//!
//! Builds a Gaussian or double-Gaussian kernel PSF, optionally warps it through an
//! affine or quadratic distortion, and prints the image box, normalization, peak,
//! second moments and aperture flux at the requested position.
//!
//! Example:
//!   psf_probe --sigma1 1.5 --sigma2 3.0 --b 0.2 --x 120.3 --y 88.7 \
//!       --affine 1.02,0.01,-0.01,0.98,0,0

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use psf::{Color, KernelPsf, Point2D, PsfConfig, PsfModel, WarpedPsf};
use psf_math::{AffineTransform, PolynomialTransform, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImageKind {
    /// Kernel image centered on the local origin
    Kernel,
    /// Image placed at the requested position
    Placed,
}

#[derive(Parser, Debug)]
#[command(
    name = "PSF Probe",
    about = "Evaluates a (possibly warped) PSF model and prints summary statistics",
    long_about = None
)]
struct Args {
    /// Stencil size in pixels (width and height)
    #[arg(long, default_value_t = 21)]
    size: usize,

    /// Inner Gaussian sigma in pixels
    #[arg(long, default_value_t = 1.5)]
    sigma1: f64,

    /// Outer Gaussian sigma in pixels (0 disables the outer component)
    #[arg(long, default_value_t = 0.0)]
    sigma2: f64,

    /// Outer-to-inner peak amplitude ratio
    #[arg(long, default_value_t = 0.0)]
    b: f64,

    /// Position x coordinate
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    x: f64,

    /// Position y coordinate
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    y: f64,

    /// Band tag (omit for band-independent)
    #[arg(long)]
    band: Option<String>,

    /// Affine warp as a,b,c,d,tx,ty with x' = a*x + b*y + tx, y' = c*x + d*y + ty
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    affine: Option<Vec<f64>>,

    /// Quadratic warp as 12 coefficients: x' terms then y' terms, each ordered
    /// 1, x, y, x^2, xy, y^2
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        conflicts_with = "affine"
    )]
    quadratic: Option<Vec<f64>>,

    /// JSON config file overriding cache tolerance and warp settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Aperture radius in pixels for the flux report
    #[arg(long, default_value_t = 3.0)]
    aperture: f64,

    /// Which image to print
    #[arg(long, value_enum, default_value_t = ImageKind::Kernel)]
    image: ImageKind,

    /// Print every pixel value
    #[arg(long)]
    dump: bool,
}

fn build_transform(args: &Args) -> Result<Option<Arc<dyn Transform>>> {
    if let Some(c) = &args.affine {
        if c.len() != 6 {
            bail!("--affine needs 6 coefficients, got {}", c.len());
        }
        let affine = AffineTransform::from_coefficients(c[0], c[1], c[2], c[3], c[4], c[5]);
        return Ok(Some(Arc::new(affine)));
    }
    if let Some(c) = &args.quadratic {
        if c.len() != 12 {
            bail!("--quadratic needs 12 coefficients, got {}", c.len());
        }
        let cx = [c[0], c[1], c[2], c[3], c[4], c[5]];
        let cy = [c[6], c[7], c[8], c[9], c[10], c[11]];
        return Ok(Some(Arc::new(PolynomialTransform::quadratic(cx, cy))));
    }
    Ok(None)
}

fn build_model(args: &Args, config: &PsfConfig) -> Result<Box<dyn PsfModel>> {
    let kernel = KernelPsf::double_gaussian(args.size, args.size, args.sigma1, args.sigma2, args.b)
        .context("failed to build kernel PSF")?
        .with_config(config)?;

    let model: Box<dyn PsfModel> = match build_transform(args)? {
        Some(transform) => {
            let warped = WarpedPsf::new(Box::new(kernel), transform).with_config(config)?;
            Box::new(warped)
        }
        None => Box::new(kernel),
    };
    Ok(model)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PsfConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PsfConfig::default(),
    };

    let model = build_model(&args, &config)?;
    let position = Point2D::new(args.x, args.y);
    let color = args.band.clone().map(Color::band).unwrap_or_default();

    let image = match args.image {
        ImageKind::Kernel => model.compute_kernel_image(&position, &color)?,
        ImageKind::Placed => model.compute_image(&position, &color)?,
    };
    let shape = model.compute_shape(&position, &color)?;
    let aperture_flux = model.compute_aperture_flux(args.aperture, &position, &color)?;

    println!("PSF Probe");
    println!("=========");
    println!("Position: ({:.3}, {:.3})  color: {color}", position.x, position.y);
    println!("Spatially invariant: {}", model.is_spatially_invariant());
    println!("Image bbox: {}", image.bbox());
    println!("Sum: {:.9}", image.sum());
    println!("Peak: {:.6e}", model.compute_peak(&position, &color)?);
    println!(
        "Moments: Ixx = {:.4}, Iyy = {:.4}, Ixy = {:.4}",
        shape.ixx, shape.iyy, shape.ixy
    );
    println!(
        "Size: rms = {:.4} px, det radius = {:.4} px, e1 = {:.4}, e2 = {:.4}",
        shape.rms(),
        shape.determinant_radius(),
        shape.e1(),
        shape.e2()
    );
    println!(
        "Aperture flux (r = {:.2} px): {:.6}",
        args.aperture, aperture_flux
    );

    if args.dump {
        let bbox = image.bbox();
        for y in bbox.min_y..=bbox.max_y() {
            let row: Vec<String> = (bbox.min_x..=bbox.max_x())
                .map(|x| format!("{:.3e}", image.get(x, y).unwrap_or(0.0)))
                .collect();
            println!("{y:>5}: {}", row.join(" "));
        }
    }

    Ok(())
}
