//! Built-in landmark detectors wrapped as Detect procedures.

use crate::{
    detectors::{
        adaptive::{AdaptiveThresholdConfig, Detection},
        ecg::{detect_r_peaks_in, EcgDetectorConfig},
        pressure::{detect_diastolic, detect_systolic},
    },
    error::{Error, Result},
    procedures::{
        args::{parse_positive, parse_threshold, threshold_defaults},
        DetectProcedure, Inputs, ProcedureDescriptor, RawArguments,
    },
    signal::TimeSeries,
};

const AUTHOR: &str = "Pulse Contributors";

/// Native samples of `[begin, end)`, or `None` when the range holds no sample.
fn window_of(wave: &TimeSeries, begin: f64, end: f64) -> Result<Option<TimeSeries>> {
    match wave.window(begin, end) {
        Ok(window) => Ok(Some(window)),
        Err(Error::EmptySpan { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn into_pair(detection: Detection) -> (Vec<f64>, Vec<f64>) {
    (detection.times, detection.values)
}

#[derive(Debug, Clone, Copy)]
pub struct RPeaks {
    pub wave: &'static str,
}

impl DetectProcedure for RPeaks {
    type Args = EcgDetectorConfig;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<EcgDetectorConfig> {
        let base = EcgDetectorConfig::default();
        Ok(EcgDetectorConfig {
            integration_window_s: parse_positive(raw, "integration_window")?,
            threshold: parse_threshold(raw, base.threshold)?,
        })
    }

    fn compute(
        &self,
        inputs: &Inputs<'_>,
        begin: f64,
        end: f64,
        cfg: &EcgDetectorConfig,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let Some(window) = window_of(inputs.wave(self.wave)?, begin, end)? else {
            return Ok((Vec::new(), Vec::new()));
        };
        let detection = detect_r_peaks_in(window.data(), window.sample_length(), window.offset(), cfg)?;
        Ok(into_pair(detection))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureLandmark {
    Systolic,
    Diastolic,
}

#[derive(Debug, Clone, Copy)]
pub struct PressurePeaks {
    pub wave: &'static str,
    pub landmark: PressureLandmark,
}

impl PressurePeaks {
    fn base(&self) -> AdaptiveThresholdConfig {
        match self.landmark {
            PressureLandmark::Systolic => AdaptiveThresholdConfig::systolic(),
            PressureLandmark::Diastolic => AdaptiveThresholdConfig::diastolic(),
        }
    }
}

impl DetectProcedure for PressurePeaks {
    type Args = AdaptiveThresholdConfig;

    fn interpret_arguments(&self, raw: &RawArguments) -> Result<AdaptiveThresholdConfig> {
        parse_threshold(raw, self.base())
    }

    fn compute(
        &self,
        inputs: &Inputs<'_>,
        begin: f64,
        end: f64,
        cfg: &AdaptiveThresholdConfig,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let Some(window) = window_of(inputs.wave(self.wave)?, begin, end)? else {
            return Ok((Vec::new(), Vec::new()));
        };
        let detect = match self.landmark {
            PressureLandmark::Systolic => detect_systolic,
            PressureLandmark::Diastolic => detect_diastolic,
        };
        let detection = detect(window.data(), window.sample_length(), window.offset(), *cfg)?;
        Ok(into_pair(detection))
    }
}

fn with_threshold_arguments(
    descriptor: ProcedureDescriptor,
    cfg: &AdaptiveThresholdConfig,
) -> ProcedureDescriptor {
    let help = [
        "Fraction of the local feature maximum used as threshold, in (0, 1]",
        "Window (seconds) the feature maximum is taken over",
        "Minimum spacing (seconds) between two landmarks",
        "Gap, in average periods, after which the threshold is relaxed",
        "Factor applied to the threshold on each relaxation, in (0, 1)",
        "Relaxations allowed between two landmarks",
    ];
    threshold_defaults(cfg)
        .into_iter()
        .zip(help)
        .fold(descriptor, |d, ((name, default), help)| d.with_argument(name, help, default))
}

pub fn descriptors() -> Vec<ProcedureDescriptor> {
    let ecg = EcgDetectorConfig::default();
    let r_peaks = ProcedureDescriptor::detect("r_peaks", RPeaks { wave: "ECG" })
        .with_description("R-peaks from the integrated squared ECG derivative")
        .with_author(AUTHOR)
        .with_required_waves(&["ECG"])
        .with_output_kind("R")
        .with_argument(
            "integration_window",
            "Moving window integration length (seconds)",
            ecg.integration_window_s.to_string(),
        );

    let sbp = ProcedureDescriptor::detect(
        "sbp",
        PressurePeaks {
            wave: "BP",
            landmark: PressureLandmark::Systolic,
        },
    )
    .with_description("Systolic peaks of arterial pressure")
    .with_author(AUTHOR)
    .with_required_waves(&["BP"])
    .with_output_kind("SBP");

    let dbp = ProcedureDescriptor::detect(
        "dbp",
        PressurePeaks {
            wave: "BP",
            landmark: PressureLandmark::Diastolic,
        },
    )
    .with_description("Diastolic troughs of arterial pressure")
    .with_author(AUTHOR)
    .with_required_waves(&["BP"])
    .with_output_kind("DBP");

    vec![
        with_threshold_arguments(r_peaks, &ecg.threshold),
        with_threshold_arguments(sbp, &AdaptiveThresholdConfig::systolic()),
        with_threshold_arguments(dbp, &AdaptiveThresholdConfig::diastolic()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::{Dataset, InsertMode},
        events::EventSeries,
        procedures::{Outcome, Request},
    };

    fn find(name: &str) -> ProcedureDescriptor {
        descriptors()
            .into_iter()
            .find(|d| d.name() == name)
            .unwrap()
    }

    /// Narrow gaussian beats every `period` seconds starting at 0.5 s.
    fn ecg(fs: f64, beats: usize, period: f64, offset: f64) -> TimeSeries {
        let duration = 0.5 + beats as f64 * period;
        let n = (duration * fs) as usize;
        let data = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                (0..beats)
                    .map(|k| {
                        let bt = 0.5 + k as f64 * period;
                        (-0.5 * ((t - bt) / 0.02).powi(2)).exp()
                    })
                    .sum()
            })
            .collect();
        TimeSeries::from_sample_rate(data, fs, offset, "ECG").unwrap()
    }

    #[test]
    fn builtins_validate() {
        for d in descriptors() {
            d.validate().unwrap();
        }
    }

    #[test]
    fn r_peaks_are_tagged_and_clipped_to_the_wave() {
        let mut ds = Dataset::new();
        ds.add_wave("ECG", ecg(250.0, 8, 0.8, 10.0)).unwrap();
        // Request reaches well past both ends of the recording.
        let outcome = find("r_peaks").execute(&ds, &Request::new(0.0, 100.0)).unwrap();
        let Outcome::Points(events) = outcome else {
            panic!("expected points");
        };
        assert_eq!(events.kind(), "R");
        assert_eq!(events.len(), 8);
        assert!((events.times()[0] - 10.5).abs() <= 1.0 / 250.0 + 1e-9);

        ds.store("R", Outcome::Points(events), InsertMode::Reject).unwrap();
        assert_eq!(ds.points("R").unwrap().len(), 8);
    }

    #[test]
    fn sub_range_only_reports_landmarks_inside_it() {
        let mut ds = Dataset::new();
        ds.add_wave("ECG", ecg(250.0, 8, 0.8, 0.0)).unwrap();
        let Outcome::Points(events) = find("r_peaks").execute(&ds, &Request::new(2.0, 5.0)).unwrap()
        else {
            panic!("expected points");
        };
        assert!(!events.is_empty());
        assert!(events.times().iter().all(|t| (2.0..5.0).contains(t)));
    }

    #[test]
    fn missing_wave_leaves_dataset_untouched() {
        let mut ds = Dataset::new();
        ds.add_points("SBP", EventSeries::new(vec![1.0], vec![120.0], "SBP").unwrap())
            .unwrap();
        let before = ds.clone();
        let err = find("dbp").execute(&ds, &Request::new(0.0, 10.0)).unwrap_err();
        match err {
            Error::MissingInput { procedure, waves, points } => {
                assert_eq!(procedure, "dbp");
                assert_eq!(waves, vec!["BP".to_string()]);
                assert!(points.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ds, before);
    }

    #[test]
    fn threshold_tunables_are_arguments() {
        let mut ds = Dataset::new();
        ds.add_wave("ECG", ecg(250.0, 4, 0.8, 0.0)).unwrap();
        let request = Request::new(0.0, 4.0).with_argument("threshold_fraction", "1.5");
        assert!(matches!(
            find("r_peaks").execute(&ds, &request),
            Err(Error::InvalidArgument { ref name, .. }) if name == "threshold_fraction"
        ));
        let d = find("sbp");
        assert_eq!(d.default_arguments()["stall_factor"], "2");
        assert_eq!(d.default_arguments()["threshold_fraction"], "0.7");
    }

    #[test]
    fn range_outside_the_wave_is_an_empty_span() {
        let mut ds = Dataset::new();
        ds.add_wave("ECG", ecg(250.0, 4, 0.8, 0.0)).unwrap();
        assert!(matches!(
            find("r_peaks").execute(&ds, &Request::new(50.0, 60.0)),
            Err(Error::EmptySpan { .. })
        ));
    }
}
