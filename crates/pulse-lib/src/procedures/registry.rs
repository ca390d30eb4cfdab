use super::{detect, modify, parameterize, Outcome, ProcedureDescriptor, ProcedureKind, Request};
use crate::{
    dataset::Dataset,
    error::{Error, Result},
};
use log::debug;
use std::collections::BTreeMap;

/// Procedures by name. Every entry passed [`ProcedureDescriptor::validate`].
#[derive(Debug, Default)]
pub struct ProcedureRegistry {
    procedures: BTreeMap<String, ProcedureDescriptor>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in filter, detector and parameter.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in modify::descriptors()
            .into_iter()
            .chain(detect::descriptors())
            .chain(parameterize::descriptors())
        {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ProcedureDescriptor) -> Result<()> {
        descriptor.validate()?;
        if self.procedures.contains_key(descriptor.name()) {
            return Err(Error::DuplicateKey {
                collection: "procedure",
                name: descriptor.name().to_string(),
            });
        }
        debug!("registered {} procedure '{}'", descriptor.kind(), descriptor.name());
        self.procedures.insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ProcedureDescriptor> {
        self.procedures.get(name)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcedureDescriptor> {
        self.procedures.values()
    }

    pub fn of_kind(&self, kind: ProcedureKind) -> impl Iterator<Item = &ProcedureDescriptor> {
        self.iter().filter(move |d| d.kind() == kind)
    }

    /// Procedures whose required waves and points are all present in `dataset`.
    pub fn available_for<'a>(
        &'a self,
        dataset: &'a Dataset,
    ) -> impl Iterator<Item = &'a ProcedureDescriptor> + 'a {
        self.iter().filter(move |d| d.inputs_available(dataset))
    }

    /// Look up `name` and run it.
    pub fn execute(&self, name: &str, dataset: &Dataset, request: &Request) -> Result<Outcome> {
        let descriptor = self.get(name).ok_or_else(|| {
            Error::invalid_argument("procedure", format!("no procedure named '{name}'"))
        })?;
        descriptor.execute(dataset, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::EventSeries,
        procedures::{DetectProcedure, Inputs, ModifyProcedure, RawArguments},
        signal::TimeSeries,
    };

    struct Echo;

    impl DetectProcedure for Echo {
        type Args = ();

        fn interpret_arguments(&self, _raw: &RawArguments) -> Result<()> {
            Ok(())
        }

        fn compute(
            &self,
            inputs: &Inputs<'_>,
            begin: f64,
            end: f64,
            _: &(),
        ) -> Result<(Vec<f64>, Vec<f64>)> {
            let (times, values) = inputs.points("R")?.slice(begin, end, 0);
            Ok((times.to_vec(), values.to_vec()))
        }
    }

    struct Scale;

    impl ModifyProcedure for Scale {
        type Args = f64;

        fn interpret_arguments(&self, raw: &RawArguments) -> Result<f64> {
            crate::procedures::args::parse_f64(raw, "factor")
        }

        fn compute(&self, series: &TimeSeries, begin: f64, end: f64, factor: &f64) -> Result<Vec<f64>> {
            Ok(series.slice(begin, end)?.iter().map(|v| v * factor).collect())
        }
    }

    fn echo() -> ProcedureDescriptor {
        ProcedureDescriptor::detect("echo", Echo)
            .with_description("Copies R events")
            .with_author("tests")
            .with_required_points(&["R"])
            .with_output_kind("R2")
    }

    #[test]
    fn builtins_register_once() {
        let mut registry = ProcedureRegistry::with_builtins().unwrap();
        assert_eq!(registry.of_kind(ProcedureKind::Modify).count(), 4);
        assert_eq!(registry.of_kind(ProcedureKind::Detect).count(), 3);
        assert_eq!(registry.of_kind(ProcedureKind::Parameterize).count(), 3);

        let again = modify::descriptors().into_iter().next().unwrap();
        let err = registry.register(again).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { collection: "procedure", .. }));
    }

    #[test]
    fn missing_required_points_fail_before_compute() {
        let mut registry = ProcedureRegistry::new();
        registry.register(echo()).unwrap();
        let mut ds = Dataset::new();
        ds.add_wave("ECG", TimeSeries::from_sample_rate(vec![0.0; 10], 10.0, 0.0, "ECG").unwrap())
            .unwrap();
        let before = ds.clone();

        let err = registry.execute("echo", &ds, &Request::new(0.0, 1.0)).unwrap_err();
        assert_eq!(
            err,
            Error::MissingInput {
                procedure: "echo".into(),
                waves: vec![],
                points: vec!["R".into()],
            }
        );
        assert_eq!(ds, before);
        assert_eq!(registry.available_for(&ds).count(), 0);

        ds.add_points("R", EventSeries::new(vec![0.2, 0.7], vec![1.0, 2.0], "R").unwrap())
            .unwrap();
        assert_eq!(registry.available_for(&ds).count(), 1);
        let Outcome::Points(events) = registry.execute("echo", &ds, &Request::new(0.0, 0.5)).unwrap()
        else {
            panic!("expected points");
        };
        assert_eq!(events.kind(), "R2");
        assert_eq!(events.times(), &[0.2]);
    }

    #[test]
    fn contract_violations_are_rejected_at_registration() {
        let mut registry = ProcedureRegistry::new();

        let no_author = ProcedureDescriptor::detect("echo", Echo)
            .with_description("Copies R events")
            .with_output_kind("R2");
        assert!(matches!(
            registry.register(no_author),
            Err(Error::InvalidProcedureContract { .. })
        ));

        let no_output_kind = ProcedureDescriptor::detect("echo", Echo)
            .with_description("Copies R events")
            .with_author("tests");
        assert!(matches!(
            registry.register(no_output_kind),
            Err(Error::InvalidProcedureContract { .. })
        ));

        let bad_default = ProcedureDescriptor::modify("scale", Scale)
            .with_description("Multiply samples")
            .with_author("tests")
            .with_argument("factor", "Multiplier", "twice");
        assert!(matches!(
            registry.register(bad_default),
            Err(Error::InvalidProcedureContract { ref procedure, .. }) if procedure == "scale"
        ));

        let modify_with_inputs = ProcedureDescriptor::modify("scale", Scale)
            .with_description("Multiply samples")
            .with_author("tests")
            .with_argument("factor", "Multiplier", "2")
            .with_required_waves(&["ECG"]);
        assert!(registry.register(modify_with_inputs).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_procedure_is_an_invalid_argument() {
        let registry = ProcedureRegistry::new();
        assert!(matches!(
            registry.execute("nope", &Dataset::new(), &Request::new(0.0, 1.0)),
            Err(Error::InvalidArgument { ref name, .. }) if name == "procedure"
        ));
    }
}
