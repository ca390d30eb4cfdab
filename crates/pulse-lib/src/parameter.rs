use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Piecewise-constant values held over possibly overlapping intervals.
///
/// Intervals stay sorted by their begin time; [`IntervalParameter::intervals_in`] and
/// [`IntervalParameter::value_at`] stop scanning once a begin time passes the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalRecord")]
pub struct IntervalParameter {
    begin_times: Vec<f64>,
    end_times: Vec<f64>,
    values: Vec<f64>,
    kind: String,
}

/// Wire form of [`IntervalParameter`]; every interval is re-added through
/// [`IntervalParameter::add_value`].
#[derive(Deserialize)]
struct IntervalRecord {
    begin_times: Vec<f64>,
    end_times: Vec<f64>,
    values: Vec<f64>,
    kind: String,
}

impl TryFrom<IntervalRecord> for IntervalParameter {
    type Error = Error;

    fn try_from(record: IntervalRecord) -> Result<Self> {
        let n = record.values.len();
        if record.begin_times.len() != n || record.end_times.len() != n {
            return Err(Error::invalid_argument(
                "intervals",
                format!(
                    "{} begins, {} ends and {} values differ in length",
                    record.begin_times.len(),
                    record.end_times.len(),
                    n
                ),
            ));
        }
        let mut parameter = IntervalParameter::new(record.kind);
        let intervals = record
            .begin_times
            .into_iter()
            .zip(record.end_times)
            .zip(record.values);
        for ((begin, end), value) in intervals {
            parameter.add_value(begin, end, value)?;
        }
        Ok(parameter)
    }
}

impl IntervalParameter {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            begin_times: Vec::new(),
            end_times: Vec::new(),
            values: Vec::new(),
            kind: kind.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn begin_times(&self) -> &[f64] {
        &self.begin_times
    }

    pub fn end_times(&self) -> &[f64] {
        &self.end_times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(begin, end, value)` triples in begin order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.begin_times
            .iter()
            .zip(&self.end_times)
            .zip(&self.values)
            .map(|((b, e), v)| (*b, *e, *v))
    }

    /// Earliest begin and latest end.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let begin = *self.begin_times.first()?;
        let end = self.end_times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((begin, end))
    }

    /// Insert an interval at its sorted position; equal begins keep insertion order.
    pub fn add_value(&mut self, begin: f64, end: f64, value: f64) -> Result<()> {
        if !(begin.is_finite() && end.is_finite()) {
            return Err(Error::invalid_argument("interval", "bounds must be finite"));
        }
        if begin > end {
            return Err(Error::invalid_argument(
                "interval",
                format!("begin {begin} is after end {end}"),
            ));
        }
        let idx = self.begin_times.partition_point(|b| *b <= begin);
        self.begin_times.insert(idx, begin);
        self.end_times.insert(idx, end);
        self.values.insert(idx, value);
        Ok(())
    }

    /// Mean of the values whose interval contains `time` (both ends inclusive).
    pub fn value_at(&self, time: f64) -> Option<f64> {
        let (sum, count) = self
            .iter()
            .take_while(|(begin, _, _)| *begin <= time)
            .filter(|(_, end, _)| *end >= time)
            .fold((0.0, 0usize), |(sum, count), (_, _, v)| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Intervals overlapping `[begin, end]`, each clipped to the query bounds.
    pub fn intervals_in(&self, begin: f64, end: f64) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.iter()
            .take_while(move |(b, _, _)| *b <= end)
            .filter(move |(_, e, _)| *e >= begin)
            .map(move |(b, e, v)| (b.max(begin), e.min(end), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn overlapping() -> IntervalParameter {
        let mut hr = IntervalParameter::new("HR");
        hr.add_value(5.0, 15.0, 9.0).unwrap();
        hr.add_value(0.0, 10.0, 5.0).unwrap();
        hr
    }

    #[test]
    fn averages_overlapping_values() {
        let hr = overlapping();
        assert_eq!(hr.value_at(7.0), Some(7.0));
        assert_eq!(hr.value_at(12.0), Some(9.0));
        assert_eq!(hr.value_at(10.0), Some(7.0));
        assert_eq!(hr.value_at(20.0), None);
        assert_eq!(hr.value_at(-1.0), None);
    }

    #[test]
    fn insertion_sorts_by_begin() {
        let hr = overlapping();
        assert_eq!(hr.begin_times(), &[0.0, 5.0]);
        assert_eq!(hr.values(), &[5.0, 9.0]);
        assert_eq!(hr.time_span(), Some((0.0, 15.0)));
    }

    #[test]
    fn rejects_inverted_interval() {
        let mut hr = IntervalParameter::new("HR");
        assert!(matches!(
            hr.add_value(3.0, 1.0, 60.0),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(hr.is_empty());
    }

    #[test]
    fn intervals_are_clipped_to_query() {
        let mut hr = overlapping();
        hr.add_value(30.0, 40.0, 1.0).unwrap();
        let clipped: Vec<_> = hr.intervals_in(8.0, 12.0).collect();
        assert_eq!(clipped, vec![(8.0, 10.0, 5.0), (8.0, 12.0, 9.0)]);
        assert_eq!(hr.intervals_in(16.0, 29.0).count(), 0);
    }

    #[test]
    fn decoding_restores_begin_order() {
        let hr: IntervalParameter = serde_json::from_str(
            r#"{"begin_times":[5.0,0.0],"end_times":[15.0,10.0],"values":[9.0,5.0],"kind":"HR"}"#,
        )
        .unwrap();
        assert_eq!(hr, overlapping());
        assert_eq!(hr.value_at(2.0), Some(5.0));

        for bad in [
            r#"{"begin_times":[3.0],"end_times":[1.0],"values":[60.0],"kind":"HR"}"#,
            r#"{"begin_times":[0.0,1.0],"end_times":[2.0],"values":[60.0],"kind":"HR"}"#,
        ] {
            assert!(serde_json::from_str::<IntervalParameter>(bad).is_err(), "{bad}");
        }
    }

    proptest! {
        #[test]
        fn begin_times_stay_sorted(
            intervals in prop::collection::vec((0.0f64..100.0, 0.0f64..10.0, -5.0f64..5.0), 0..30)
        ) {
            let mut p = IntervalParameter::new("HR");
            for (begin, width, value) in intervals {
                p.add_value(begin, begin + width, value).unwrap();
            }
            prop_assert!(p.begin_times().windows(2).all(|w| w[0] <= w[1]));
            for (b, e, _) in p.iter() {
                prop_assert!(b <= e);
            }
        }
    }
}
