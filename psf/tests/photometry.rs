//! PSF-weighted photometry and batch evaluation on synthetic frames.

use std::sync::Arc;

use approx::assert_relative_eq;
use psf::{
    compute_images_parallel, psf_flux, BoundingBox, Color, Image, KernelPsf, Point2D, PsfError,
    PsfModel, PsfRequest, WarpedPsf,
};
use psf_math::AffineTransform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Frame holding `flux` times the PSF image at `center`
fn frame_with_source(psf: &dyn PsfModel, center: &Point2D, flux: f64) -> Image {
    let stamp = psf.compute_image(center, &Color::default()).unwrap();
    let mut frame = Image::new(BoundingBox::new(0, 0, 64, 64));
    for y in stamp.y0()..=stamp.bbox().max_y() {
        for x in stamp.x0()..=stamp.bbox().max_x() {
            if let Some(value) = stamp.get(x, y) {
                let _ = frame.set(x, y, flux * value);
            }
        }
    }
    frame
}

#[test]
fn test_psf_flux_recovers_injected_source() {
    let psf = KernelPsf::double_gaussian(15, 15, 1.5, 3.0, 0.1).unwrap();
    let center = Point2D::new(31.2, 27.8);
    let frame = frame_with_source(&psf, &center, 2500.0);

    let result = psf_flux(&frame, None, &psf, &center, &Color::default()).unwrap();
    assert_relative_eq!(result.flux, 2500.0, max_relative = 1e-10);
    assert!(result.flux_err.is_none());
}

#[test]
fn test_psf_flux_error_from_variance() {
    let psf = KernelPsf::double_gaussian(11, 11, 1.2, 0.0, 0.0).unwrap();
    let center = Point2D::new(20.0, 20.0);
    let frame = frame_with_source(&psf, &center, 100.0);
    let variance = Image::from_fn(frame.bbox(), |_, _| 4.0);

    let result = psf_flux(&frame, Some(&variance), &psf, &center, &Color::default()).unwrap();
    let weights = psf.compute_image(&center, &Color::default()).unwrap();
    let sum_w2: f64 = weights.array().iter().map(|w| w * w).sum();
    // unit-sum weights: err = sqrt(4 * sum_w2) / sum_w2
    assert_relative_eq!(
        result.flux_err.unwrap(),
        2.0 / sum_w2.sqrt(),
        max_relative = 1e-10
    );
}

#[test]
fn test_psf_flux_rejects_disjoint_and_mismatched_inputs() {
    let psf = KernelPsf::double_gaussian(7, 7, 1.0, 0.0, 0.0).unwrap();
    let frame = Image::new(BoundingBox::new(0, 0, 32, 32));
    let far = Point2D::new(500.0, 500.0);
    assert!(psf_flux(&frame, None, &psf, &far, &Color::default())
        .unwrap_err()
        .is_computation());

    let wrong = Image::new(BoundingBox::new(0, 0, 16, 16));
    assert!(matches!(
        psf_flux(&frame, Some(&wrong), &psf, &Point2D::new(8.0, 8.0), &Color::default()),
        Err(PsfError::InvalidArgument(_))
    ));
}

#[test]
fn test_parallel_batch_matches_serial() {
    let underlying = KernelPsf::double_gaussian(13, 13, 1.8, 0.0, 0.0).unwrap();
    let shear = AffineTransform::from_coefficients(1.02, 0.04, -0.01, 0.97, 0.0, 0.0);
    let warped = WarpedPsf::new(Box::new(underlying), Arc::new(shear));

    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let requests: Vec<PsfRequest> = (0..40)
        .map(|_| {
            PsfRequest::new(
                Point2D::new(
                    rng.random_range(0.0..500.0),
                    rng.random_range(0.0..500.0),
                ),
                Color::band("r"),
            )
        })
        .collect();

    let results = compute_images_parallel(&warped, &requests);
    let serial = warped.clone_psf();
    for (request, result) in requests.iter().zip(results) {
        let image = result.unwrap();
        let expected = serial
            .compute_image(&request.position, &request.color)
            .unwrap();
        assert_eq!(*image, *expected);
    }

    // the shared model's own caches were not used by the workers
    assert!(warped.caches().image().cached_key().is_none());
}
