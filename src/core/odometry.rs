// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frame by frame monocular visual odometry.
//!
//! Every frame goes through one of the following states:
//!
//! * `FirstFrame`: features are detected and the filter is seeded at the origin.
//! * `Tracked`: enough correspondences with the previous frame survived,
//!   the relative motion is estimated, scaled and chained to the global pose,
//!   and the filtered position is appended to the trajectory.
//! * `Lost`: too few correspondences, the last filtered position is repeated.
//! * `Unreadable`: the frame could not be read, iterations stop there.
//!
//! Features are detected again on every readable frame.

use log::{debug, info, warn};
use nalgebra::DMatrix;
use std::iter::FusedIterator;

use crate::core::camera::Intrinsics;
use crate::core::kalman::{ConstantVelocityFilter, FilterConfig};
use crate::core::pose::{self, RansacConfig};
use crate::core::scale::{Scale, ScaleSource};
use crate::core::track::{self, FeatureTracker, KltTracker};
use crate::core::trajectory::{self, GlobalPose, Trajectory};
use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Point2, Vec3};

/// Minimal number of correspondences to attempt a motion estimation.
pub const MIN_CORRESPONDENCES: usize = 8;

/// Random access to the frames of a sequence.
pub trait FrameSource {
    /// Number of frames.
    fn len(&self) -> usize;

    /// True if there is no frame.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the frame at `index` as an 8 bits gray image.
    fn read(&self, index: usize) -> Result<DMatrix<u8>>;
}

impl FrameSource for Vec<DMatrix<u8>> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read(&self, index: usize) -> Result<DMatrix<u8>> {
        self.get(index).cloned().ok_or(Error::FrameIndex {
            index,
            len: self.as_slice().len(),
        })
    }
}

/// Configuration of the odometry.
#[derive(Debug, Clone)]
pub struct Config<T = KltTracker> {
    /// Feature detection and tracking.
    pub tracker: T,
    /// Minimal pixel displacement of a correspondence to be used for motion estimation.
    pub min_parallax: Float,
    /// Robust estimation of the essential matrix.
    pub ransac: RansacConfig,
    /// Smoothing of the trajectory.
    pub filter: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker: KltTracker::default(),
            min_parallax: 5.0,
            ransac: RansacConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

/// State of a processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// First frame of the sequence.
    FirstFrame,
    /// Motion estimated from enough correspondences.
    Tracked,
    /// Not enough correspondences, the position did not change.
    Lost,
    /// The frame could not be read.
    Unreadable,
}

/// Output of the processing of one frame.
#[derive(Debug, Clone)]
pub struct FrameStep {
    /// Index of the frame.
    pub index: usize,
    /// What happened to this frame.
    pub state: FrameState,
    /// The frame, if it could be read.
    pub image: Option<DMatrix<u8>>,
    /// Points tracked in this frame, only in the `Tracked` state.
    pub tracked: Option<Vec<Point2>>,
    /// Scale applied to the relative translation, only in the `Tracked` state.
    pub scale: Option<Scale>,
}

impl FrameStep {
    fn unreadable(index: usize) -> Self {
        Self {
            index,
            state: FrameState::Unreadable,
            image: None,
            tracked: None,
            scale: None,
        }
    }
}

/// Visual odometry over a sequence of frames.
/// Can only be constructed by initialization from a `Config`.
pub struct Odometry<F, T, S> {
    config: Config<T>,
    frames: F,
    intrinsics: Intrinsics,
    scale_source: S,
    state: State,
}

/// Mutable state, only modified in frame order.
struct State {
    pose: GlobalPose,
    filter: ConstantVelocityFilter,
    trajectory: Trajectory,
    previous: Option<PreviousFrame>,
    unscaled_frames: usize,
}

/// Previous frame and the points detected in it.
struct PreviousFrame {
    image: DMatrix<u8>,
    points: Vec<Point2>,
}

impl<T> Config<T> {
    /// Same configuration with another feature tracker.
    pub fn with_tracker<U>(self, tracker: U) -> Config<U> {
        Config {
            tracker,
            min_parallax: self.min_parallax,
            ransac: self.ransac,
            filter: self.filter,
        }
    }

    /// Initialize the odometry of a sequence of frames.
    pub fn init<F, S>(
        self,
        frames: F,
        intrinsics: Intrinsics,
        scale_source: S,
    ) -> Odometry<F, T, S>
    where
        F: FrameSource,
        T: FeatureTracker,
        S: ScaleSource,
    {
        let pose = GlobalPose::identity();
        let filter = ConstantVelocityFilter::new(&self.filter, pose.translation);
        Odometry {
            state: State {
                pose,
                filter,
                trajectory: Trajectory::new(),
                previous: None,
                unscaled_frames: 0,
            },
            config: self,
            frames,
            intrinsics,
            scale_source,
        }
    }
} // impl Config

impl<F, T, S> Odometry<F, T, S>
where
    F: FrameSource,
    T: FeatureTracker,
    S: ScaleSource,
{
    /// Process the frame at `index`.
    /// Frames are expected in order, starting at 0.
    pub fn process_frame(&mut self, index: usize) -> FrameStep {
        let image = match self.frames.read(index) {
            Ok(image) => image,
            Err(err) => {
                warn!("Frame {}: unreadable, stopping ({})", index, err);
                return FrameStep::unreadable(index);
            }
        };
        if index == 0 {
            return self.first_frame(image);
        }
        let pairs = match self.state.previous.take() {
            Some(previous) => {
                let tracked = self
                    .config
                    .tracker
                    .track(&previous.image, &image, &previous.points);
                let min_parallax = self.config.min_parallax;
                track::filter_by_parallax(&tracked.previous, &tracked.current, min_parallax)
            }
            None => track::Correspondences::default(),
        };
        if pairs.len() < MIN_CORRESPONDENCES {
            info!("Frame {}: insufficient matches ({})", index, pairs.len());
            return self.lost(index, image);
        }

        let motion = pose::estimate(
            &self.config.ransac,
            &pairs.previous,
            &pairs.current,
            &self.intrinsics,
        );
        let (rotation, translation) = motion.into_parts();
        let scale = self.scale_source.resolve_scale(&translation, index);
        if !scale.is_reference() {
            self.state.unscaled_frames += 1;
            if self.state.unscaled_frames == 1 {
                warn!("Frame {}: no reference scale, translations are not scaled", index);
            }
        }
        let pose = &self.state.pose;
        self.state.pose = trajectory::compose(pose, &rotation, &translation, scale.factor());
        self.state.filter.predict();
        self.state.filter.update(&self.state.pose.translation);
        self.state.trajectory.push(self.state.filter.position());
        debug!(
            "Frame {}: {} correspondences, scale {:?}",
            index,
            pairs.len(),
            scale
        );

        self.remember(image.clone());
        FrameStep {
            index,
            state: FrameState::Tracked,
            image: Some(image),
            tracked: Some(pairs.current),
            scale: Some(scale),
        }
    }

    fn first_frame(&mut self, image: DMatrix<u8>) -> FrameStep {
        let origin = self.state.pose.translation;
        self.state.filter = ConstantVelocityFilter::new(&self.config.filter, origin);
        self.state.trajectory.push(self.state.pose.translation);
        self.remember(image.clone());
        FrameStep {
            index: 0,
            state: FrameState::FirstFrame,
            image: Some(image),
            tracked: None,
            scale: None,
        }
    }

    fn lost(&mut self, index: usize, image: DMatrix<u8>) -> FrameStep {
        self.state.trajectory.push(self.state.filter.position());
        self.remember(image.clone());
        FrameStep {
            index,
            state: FrameState::Lost,
            image: Some(image),
            tracked: None,
            scale: None,
        }
    }

    /// Detect features on the frame and keep it for the next one.
    fn remember(&mut self, image: DMatrix<u8>) {
        let points = self.config.tracker.detect(&image);
        self.state.previous = Some(PreviousFrame { image, points });
    }

    /// Lazily process all frames in order.
    pub fn run_all(self) -> RunAll<F, T, S> {
        RunAll {
            odometry: self,
            next_index: 0,
            done: false,
        }
    }
}

impl<F, T, S> Odometry<F, T, S> {
    /// Filtered positions of all processed frames.
    pub fn trajectory(&self) -> &Trajectory {
        &self.state.trajectory
    }

    /// Raw (unfiltered) global pose.
    pub fn pose(&self) -> &GlobalPose {
        &self.state.pose
    }

    /// Current filtered position.
    pub fn filtered_position(&self) -> Vec3 {
        self.state.filter.position()
    }

    /// Number of frames whose translation could not be scaled by the scale source.
    pub fn unscaled_frames(&self) -> usize {
        self.state.unscaled_frames
    }

    /// Camera intrinsics.
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// The frames of the sequence.
    pub fn frames(&self) -> &F {
        &self.frames
    }
}

/// Iterator over the processed frames, see `Odometry::run_all`.
///
/// Stops at the end of the sequence, or right after an unreadable frame.
pub struct RunAll<F, T, S> {
    odometry: Odometry<F, T, S>,
    next_index: usize,
    done: bool,
}

impl<F, T, S> RunAll<F, T, S> {
    /// Trajectory up to the last yielded frame.
    pub fn trajectory(&self) -> &Trajectory {
        self.odometry.trajectory()
    }

    /// Raw global pose at the last yielded frame.
    pub fn pose(&self) -> &GlobalPose {
        self.odometry.pose()
    }

    /// Odometry in its current state.
    pub fn odometry(&self) -> &Odometry<F, T, S> {
        &self.odometry
    }

    /// Stop iterating and get back the odometry.
    pub fn into_odometry(self) -> Odometry<F, T, S> {
        self.odometry
    }
}

impl<F, T, S> Iterator for RunAll<F, T, S>
where
    F: FrameSource,
    T: FeatureTracker,
    S: ScaleSource,
{
    type Item = FrameStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_index >= self.odometry.frames.len() {
            self.done = true;
            return None;
        }
        let step = self.odometry.process_frame(self.next_index);
        self.next_index += 1;
        if step.state == FrameState::Unreadable {
            self.done = true;
        }
        Some(step)
    }
}

impl<F, T, S> FusedIterator for RunAll<F, T, S>
where
    F: FrameSource,
    T: FeatureTracker,
    S: ScaleSource,
{
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scale::{GroundTruthScale, UnitScale, Unscaled};
    use crate::core::synthetic::{self, SceneTracker};
    use approx::assert_relative_eq;

    fn lateral_ground_truth(nb_frames: usize) -> GroundTruthScale {
        GroundTruthScale::new(
            (0..nb_frames)
                .map(|i| Vec3::new(i as Float, 0.0, 0.0))
                .collect(),
        )
    }

    fn lateral_config(tracker: SceneTracker) -> Config<SceneTracker> {
        let config: Config = Config::default();
        config.with_tracker(tracker)
    }

    #[test]
    fn lateral_translation_end_to_end() {
        let nb_frames = 31;
        let odometry = lateral_config(SceneTracker::lateral(60)).init(
            synthetic::index_frames(nb_frames),
            synthetic::intrinsics(),
            lateral_ground_truth(nb_frames),
        );
        let mut run = odometry.run_all();
        let mut states = Vec::new();
        while let Some(step) = run.next() {
            assert_eq!(step.index + 1, run.trajectory().len());
            // Raw positions are exact: one unit along -x per frame.
            let expected = Vec3::new(-(step.index as Float), 0.0, 0.0);
            assert_relative_eq!(expected, run.pose().translation, epsilon = 1e-6);
            states.push(step.state);
        }
        assert_eq!(FrameState::FirstFrame, states[0]);
        assert!(states[1..].iter().all(|s| *s == FrameState::Tracked));

        let odometry = run.into_odometry();
        assert_eq!(0, odometry.unscaled_frames());
        let positions = odometry.trajectory().positions();
        assert_eq!(nb_frames, positions.len());
        let last_step = (positions[nb_frames - 1] - positions[nb_frames - 2]).norm();
        assert_relative_eq!(1.0, last_step, epsilon = 1e-2);
    }

    #[test]
    fn lost_frames_repeat_the_last_position() {
        let mut tracker = SceneTracker::lateral(60);
        tracker.blind = vec![5];
        let mut odometry = lateral_config(tracker).init(
            synthetic::index_frames(8),
            synthetic::intrinsics(),
            lateral_ground_truth(8),
        );
        let states: Vec<_> = (0..8).map(|i| odometry.process_frame(i).state).collect();
        use FrameState::*;
        let expected = vec![FirstFrame, Tracked, Tracked, Tracked, Tracked, Lost, Lost, Tracked];
        assert_eq!(expected, states);
        let positions = odometry.trajectory().positions();
        assert_eq!(8, positions.len());
        assert_eq!(positions[4], positions[5]);
        assert_eq!(positions[4], positions[6]);
        assert_ne!(positions[6], positions[7]);
    }

    #[test]
    fn uniform_frames_are_lost() {
        let frames = vec![DMatrix::repeat(40, 60, 100_u8); 5];
        let config: Config = Config::default();
        let odometry = config.init(frames, synthetic::intrinsics(), UnitScale);
        let mut run = odometry.run_all();
        let states: Vec<_> = run.by_ref().map(|step| step.state).collect();
        assert_eq!(FrameState::FirstFrame, states[0]);
        assert_eq!(vec![FrameState::Lost; 4], states[1..].to_vec());
        assert_eq!(5, run.trajectory().len());
        assert!(run.trajectory().iter().all(|p| *p == Vec3::zeros()));
    }

    #[test]
    fn missing_reference_scale_is_counted() {
        let odometry = lateral_config(SceneTracker::lateral(40)).init(
            synthetic::index_frames(5),
            synthetic::intrinsics(),
            UnitScale,
        );
        let mut run = odometry.run_all();
        for step in run.by_ref().skip(1) {
            assert_eq!(Some(Scale::Fallback(Unscaled::Unavailable)), step.scale);
        }
        assert_eq!(4, run.into_odometry().unscaled_frames());
    }

    /// Frames that cannot be read after a given index.
    struct Corrupted {
        frames: Vec<DMatrix<u8>>,
        readable: usize,
    }

    impl FrameSource for Corrupted {
        fn len(&self) -> usize {
            self.frames.len()
        }

        fn read(&self, index: usize) -> Result<DMatrix<u8>> {
            if index < self.readable {
                self.frames.read(index)
            } else {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "corrupted frame",
                )))
            }
        }
    }

    #[test]
    fn unreadable_frame_stops_iterations() {
        let frames = Corrupted {
            frames: synthetic::index_frames(10),
            readable: 3,
        };
        let odometry = lateral_config(SceneTracker::lateral(40)).init(
            frames,
            synthetic::intrinsics(),
            lateral_ground_truth(10),
        );
        let mut run = odometry.run_all();
        let steps: Vec<_> = run.by_ref().collect();
        assert_eq!(4, steps.len());
        assert_eq!(FrameState::Unreadable, steps[3].state);
        assert!(steps[3].image.is_none() && steps[3].tracked.is_none());
        assert!(run.next().is_none());
        assert_eq!(3, run.trajectory().len());
    }

    #[test]
    fn frame_source_out_of_range() {
        let frames = synthetic::index_frames(2);
        assert!(matches!(
            frames.read(2),
            Err(Error::FrameIndex { index: 2, len: 2 })
        ));
    }
}
