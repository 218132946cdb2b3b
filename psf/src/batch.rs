//! Evaluating many PSF images at once across a thread pool.

use std::sync::Arc;

use psf_math::{Image, Point2D};
use rayon::prelude::*;

use crate::color::Color;
use crate::error::PsfError;
use crate::model::PsfModel;

/// One position/color pair to evaluate
#[derive(Debug, Clone, PartialEq)]
pub struct PsfRequest {
    pub position: Point2D,
    pub color: Color,
}

impl PsfRequest {
    pub fn new(position: Point2D, color: Color) -> Self {
        Self { position, color }
    }
}

/// Placed images for every request, in request order.
///
/// Each rayon worker evaluates on its own [`PsfModel::clone_psf`] copy so the workers
/// never contend for one cache slot; `model`'s own caches are left untouched. Failures
/// are reported per request.
pub fn compute_images_parallel(
    model: &dyn PsfModel,
    requests: &[PsfRequest],
) -> Vec<Result<Arc<Image>, PsfError>> {
    log::debug!("evaluating {} PSF images in parallel", requests.len());
    requests
        .par_iter()
        .map_init(
            || model.clone_psf(),
            |worker, request| worker.compute_image(&request.position, &request.color),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel_psf::KernelPsf;

    #[test]
    fn test_results_follow_request_order() {
        let psf = KernelPsf::double_gaussian(5, 5, 1.0, 0.0, 0.0).unwrap();
        let requests: Vec<PsfRequest> = (0..50)
            .map(|i| PsfRequest::new(Point2D::new(i as f64 * 3.0, 1.0), Color::default()))
            .collect();
        let results = compute_images_parallel(&psf, &requests);
        assert_eq!(results.len(), requests.len());
        for (request, result) in requests.iter().zip(&results) {
            let image = result.as_ref().unwrap();
            let expected = psf.compute_image(&request.position, &request.color).unwrap();
            assert_eq!(**image, *expected);
        }
    }

    #[test]
    fn test_failures_are_per_request() {
        let psf = KernelPsf::double_gaussian(5, 5, 1.0, 0.0, 0.0).unwrap();
        let requests = vec![
            PsfRequest::new(Point2D::new(1.0, 1.0), Color::default()),
            PsfRequest::new(Point2D::new(f64::INFINITY, 1.0), Color::default()),
        ];
        let results = compute_images_parallel(&psf, &requests);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_computation());
    }
}
