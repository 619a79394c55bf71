//! Pose estimation with MoveNet style keypoint outputs.
use anyhow::{bail, Result};
use image::RgbImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use smallvec::SmallVec;
use tract_onnx::prelude::Tensor;

use super::{output, values, SCORE_THRESHOLD};
use crate::{
    draw::{CORAL, WHITE},
    registry::PoseLayout,
};

/// Keypoints per pose, in the COCO order.
pub const NUM_KEYPOINTS: usize = 17;
/// Minimum score of a keypoint to be drawn.
pub const KEYPOINT_THRESHOLD: f32 = 0.3;

/// Values per instance of multi-pose outputs.
const MULTI_POSE_STRIDE: usize = NUM_KEYPOINTS * 3 + 5;

/// Pairs of keypoints connected in the skeleton.
pub const KEYPOINT_EDGES: [(usize, usize); 18] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (0, 5),
    (0, 6),
    (5, 7),
    (7, 9),
    (6, 8),
    (8, 10),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
];

/// Keypoint in pixel coordinates of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    pub keypoints: SmallVec<[Keypoint; NUM_KEYPOINTS]>,
    pub score: f32,
}

/// Decode the poses of the first output for a frame of the given size.
///
/// Single pose models always yield one pose scored by the mean keypoint score. Instances of
/// multi-pose models are dropped if their score is not above `SCORE_THRESHOLD`.
pub fn decode(
    outputs: &[Tensor],
    layout: PoseLayout,
    width: u32,
    height: u32,
) -> Result<Vec<Pose>> {
    let raw = values(output(outputs, 0)?)?;
    let (width, height) = (width as f32, height as f32);

    let keypoints = |values: &[f32]| -> SmallVec<[Keypoint; NUM_KEYPOINTS]> {
        values
            .chunks_exact(3)
            .map(|yxs| Keypoint {
                x: yxs[1] * width,
                y: yxs[0] * height,
                score: yxs[2],
            })
            .collect()
    };

    match layout {
        PoseLayout::SinglePose => {
            if raw.len() < NUM_KEYPOINTS * 3 {
                bail!("expected {} keypoint values, got {}", NUM_KEYPOINTS * 3, raw.len());
            }
            let keypoints = keypoints(&raw[..NUM_KEYPOINTS * 3]);
            let score =
                keypoints.iter().map(|kp| kp.score).sum::<f32>() / NUM_KEYPOINTS as f32;

            Ok(vec![Pose { keypoints, score }])
        }
        PoseLayout::MultiPose => {
            if raw.len() % MULTI_POSE_STRIDE != 0 {
                bail!(
                    "multi-pose output of {} values is not a multiple of {}",
                    raw.len(),
                    MULTI_POSE_STRIDE
                );
            }

            Ok(raw
                .chunks_exact(MULTI_POSE_STRIDE)
                .filter(|instance| instance[MULTI_POSE_STRIDE - 1] > SCORE_THRESHOLD)
                .map(|instance| Pose {
                    keypoints: keypoints(&instance[..NUM_KEYPOINTS * 3]),
                    score: instance[MULTI_POSE_STRIDE - 1],
                })
                .collect())
        }
    }
}

/// Draw the skeleton and keypoints of every pose.
pub fn draw(frame: &mut RgbImage, poses: &[Pose]) {
    for pose in poses {
        let visible = |idx: usize| {
            pose.keypoints
                .get(idx)
                .filter(|kp| kp.score > KEYPOINT_THRESHOLD)
        };

        for (from, to) in KEYPOINT_EDGES {
            if let (Some(a), Some(b)) = (visible(from), visible(to)) {
                // Three parallel segments for a visible line width
                for offset in [-1.0, 0.0, 1.0] {
                    draw_line_segment_mut(
                        frame,
                        (a.x + offset, a.y),
                        (b.x + offset, b.y),
                        CORAL,
                    );
                }
            }
        }

        for kp in pose.keypoints.iter().filter(|kp| kp.score > KEYPOINT_THRESHOLD) {
            let center = (kp.x as i32, kp.y as i32);
            draw_filled_circle_mut(frame, center, 4, WHITE);
            draw_filled_circle_mut(frame, center, 2, CORAL);
        }
    }
}

#[cfg(test)]
mod test {

    use image::Rgb;

    use super::*;

    fn single_pose_values(score: f32) -> Vec<f32> {
        (0..NUM_KEYPOINTS)
            .flat_map(|idx| [0.1 + idx as f32 * 0.05, 0.5, score])
            .collect()
    }

    #[test]
    fn single_pose_in_pixels() -> Result<()> {
        let outputs = vec![Tensor::from_shape(&[1, 1, 17, 3], &single_pose_values(0.8))?];
        let poses = decode(&outputs, PoseLayout::SinglePose, 200, 100)?;

        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].keypoints.len(), NUM_KEYPOINTS);
        assert_eq!(
            poses[0].keypoints[0],
            Keypoint {
                x: 100.0,
                y: 10.0,
                score: 0.8
            }
        );
        assert!((poses[0].score - 0.8).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn short_single_pose_output() -> Result<()> {
        let outputs = vec![Tensor::from_shape::<f32>(&[1, 1, 2, 3], &[0.0; 6])?];
        assert!(decode(&outputs, PoseLayout::SinglePose, 200, 100).is_err());

        Ok(())
    }

    #[test]
    fn multi_pose_drops_unlikely_instances() -> Result<()> {
        let mut raw = Vec::new();
        for instance_score in [0.9, 0.2, 0.6] {
            raw.extend(single_pose_values(0.5));
            raw.extend([0.1, 0.1, 0.9, 0.9, instance_score]);
        }
        let outputs = vec![Tensor::from_shape(&[1, 3, MULTI_POSE_STRIDE], &raw)?];

        let poses = decode(&outputs, PoseLayout::MultiPose, 256, 256)?;
        let scores: Vec<_> = poses.iter().map(|pose| pose.score).collect();
        assert_eq!(scores, vec![0.9, 0.6]);

        Ok(())
    }

    #[test]
    fn malformed_multi_pose_output() -> Result<()> {
        let outputs = vec![Tensor::from_shape::<f32>(&[1, 1, 10], &[0.0; 10])?];
        assert!(decode(&outputs, PoseLayout::MultiPose, 256, 256).is_err());

        Ok(())
    }

    #[test]
    fn hidden_keypoints_are_not_drawn() {
        let mut frame = RgbImage::new(100, 100);
        let keypoints = (0..NUM_KEYPOINTS)
            .map(|_| Keypoint {
                x: 50.0,
                y: 50.0,
                score: 0.1,
            })
            .collect();
        draw(
            &mut frame,
            &[Pose {
                keypoints,
                score: 0.1,
            }],
        );

        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn visible_keypoints_are_connected() {
        let mut frame = RgbImage::new(100, 100);
        let mut keypoints: SmallVec<[Keypoint; NUM_KEYPOINTS]> = (0..NUM_KEYPOINTS)
            .map(|_| Keypoint {
                x: 0.0,
                y: 0.0,
                score: 0.0,
            })
            .collect();
        // Left shoulder to left elbow
        keypoints[5] = Keypoint {
            x: 20.0,
            y: 50.0,
            score: 0.9,
        };
        keypoints[7] = Keypoint {
            x: 80.0,
            y: 50.0,
            score: 0.9,
        };

        draw(
            &mut frame,
            &[Pose {
                keypoints,
                score: 0.5,
            }],
        );

        assert_eq!(frame[(50, 50)], CORAL);
        assert_eq!(frame[(20, 50)], CORAL);
        assert_eq!(frame[(20, 53)], WHITE);
        assert_eq!(frame[(50, 80)], Rgb([0, 0, 0]));
        // Edges to hidden keypoints at the origin, nose to left shoulder and left elbow to wrist
        assert_eq!(frame[(10, 25)], Rgb([0, 0, 0]));
        assert_eq!(frame[(40, 25)], Rgb([0, 0, 0]));
    }
}
