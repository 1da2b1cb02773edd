//! Integration tests for pipeline composition, parameter routing and custom steps

use kolosal_pipeline::prelude::*;
use ndarray::{array, Array1, Array2};
use std::any::Any;

// ============================================================================
// Custom steps
// ============================================================================

/// Adds a constant to every feature
#[derive(Debug, Clone)]
struct AddConstant {
    value: f64,
    fitted: bool,
}

impl AddConstant {
    fn new(value: f64) -> Self {
        Self { value, fitted: false }
    }
}

impl Transformer for AddConstant {
    fn kind(&self) -> &'static str {
        "addconstant"
    }

    fn fit(&mut self, _x: &Array2<f64>, _y: Option<&Array1<f64>>) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.fitted {
            return Err(PipelineError::NotFitted("AddConstant".to_string()));
        }
        Ok(x + self.value)
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("value".to_string(), ParamValue::Float(self.value));
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "value" => self.value = value.to_f64(name)?,
            _ => {
                return Err(PipelineError::invalid_param(name, value, "unknown parameter for AddConstant"))
            }
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Predicts the most frequent training label
#[derive(Debug, Clone, Default)]
struct MajorityClass {
    label: Option<f64>,
}

impl Estimator for MajorityClass {
    fn kind(&self) -> &'static str {
        "majorityclass"
    }

    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut counts: Vec<(f64, usize)> = Vec::new();
        for &v in y.iter() {
            match counts.iter_mut().find(|(l, _)| *l == v) {
                Some((_, n)) => *n += 1,
                None => counts.push((v, 1)),
            }
        }
        self.label = counts.iter().max_by_key(|(_, n)| *n).map(|(l, _)| *l);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let label = self
            .label
            .ok_or_else(|| PipelineError::NotFitted("MajorityClass".to_string()))?;
        Ok(Array1::from_elem(x.nrows(), label))
    }

    fn is_fitted(&self) -> bool {
        self.label.is_some()
    }

    fn get_params(&self) -> Params {
        Params::new()
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        Err(PipelineError::invalid_param(name, value, "MajorityClass has no parameters"))
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn blobs() -> (Array2<f64>, Array1<f64>) {
    let x = array![
        [0.5, 1.0],
        [1.0, 0.5],
        [1.5, 1.5],
        [0.0, 1.0],
        [1.0, 2.0],
        [6.0, 7.0],
        [7.0, 6.5],
        [6.5, 6.0],
        [7.5, 7.5],
        [6.0, 8.0],
        [12.0, 1.0],
        [13.0, 0.5],
        [12.5, 1.5],
        [11.5, 0.0],
        [13.5, 1.0],
    ];
    let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0];
    (x, y)
}

// ============================================================================
// Fit / predict contract
// ============================================================================

#[test]
fn test_fit_then_predict_on_training_data() {
    let (x, y) = blobs();
    let pipelines = vec![
        vec![Step::estimator("tree", DecisionTreeClassifier::new())],
        vec![
            Step::transformer("scaler", Scaler::standard()),
            Step::estimator("tree", DecisionTreeClassifier::new()),
        ],
        vec![
            Step::transformer("scaler", Scaler::new(ScalerType::MinMax)),
            Step::transformer("pca", Pca::new(2)),
            Step::transformer("shift", AddConstant::new(3.0)),
            Step::estimator("tree", DecisionTreeClassifier::new()),
        ],
        vec![
            Step::passthrough("identity"),
            Step::transformer("scaler", Scaler::new(ScalerType::Robust)),
            Step::estimator("majority", MajorityClass::default()),
        ],
    ];

    for steps in pipelines {
        let mut pipe = Pipeline::new(steps).unwrap();
        pipe.fit(&x, &y).unwrap();
        let predictions = pipe.predict(&x).unwrap();
        assert_eq!(predictions.len(), x.nrows());
        let score = pipe.score(&x, &y).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}

#[test]
fn test_predict_is_repeatable() {
    let (x, y) = blobs();
    let mut pipe = make_pipeline(vec![
        Component::transformer(Scaler::standard()),
        Component::transformer(Pca::new(2)),
        Component::estimator(DecisionTreeClassifier::new()),
    ])
    .unwrap();
    pipe.fit(&x, &y).unwrap();

    let first = pipe.predict(&x).unwrap();
    let second = pipe.predict(&x).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, y);
}

#[test]
fn test_commuting_steps_can_be_swapped() {
    let (x, y) = blobs();
    let build = |a: f64, b: f64| {
        Pipeline::new(vec![
            Step::transformer("first", AddConstant::new(a)),
            Step::transformer("second", AddConstant::new(b)),
            Step::estimator("tree", DecisionTreeClassifier::new().with_max_depth(2)),
        ])
        .unwrap()
    };

    let mut forward = build(1.0, 2.0);
    let mut swapped = build(2.0, 1.0);
    forward.fit(&x, &y).unwrap();
    swapped.fit(&x, &y).unwrap();

    let probe = array![[0.0, 0.0], [7.0, 7.0], [12.0, 2.0], [4.0, 4.0]];
    assert_eq!(forward.predict(&probe).unwrap(), swapped.predict(&probe).unwrap());
}

#[test]
fn test_matches_manual_application() {
    let (x, y) = blobs();
    let mut pipe = Pipeline::new(vec![
        Step::transformer("scaler", Scaler::standard()),
        Step::transformer("pca", Pca::new(1)),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();
    pipe.fit(&x, &y).unwrap();

    let mut scaler = Scaler::standard();
    let mut pca = Pca::new(1);
    let mut tree = DecisionTreeClassifier::new();
    let reduced = pca.fit_transform(&scaler.fit_transform(&x, None).unwrap(), None).unwrap();
    tree.fit(&reduced, &y).unwrap();

    let probe = array![[1.0, 1.0], [6.5, 7.0], [12.0, 0.5]];
    let manual = tree
        .predict(&pca.transform(&scaler.transform(&probe).unwrap()).unwrap())
        .unwrap();
    assert_eq!(pipe.predict(&probe).unwrap(), manual);
}

// ============================================================================
// Parameters
// ============================================================================

#[test]
fn test_custom_step_params() {
    let mut pipe = Pipeline::new(vec![
        Step::transformer("shift", AddConstant::new(1.0)),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();

    pipe.set_param("shift__value", ParamValue::Float(-4.0)).unwrap();
    assert_eq!(pipe.get_params()["shift__value"], ParamValue::Float(-4.0));
    assert_eq!(pipe.named_step_as::<AddConstant>("shift").unwrap().value, -4.0);
    assert!(pipe.named_step_as::<Scaler>("shift").is_none());
}

#[test]
fn test_set_params_stops_at_first_error() {
    let mut pipe = Pipeline::new(vec![
        Step::transformer("scaler", Scaler::standard()),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();

    let mut params = Params::new();
    params.insert("scaler__kind".to_string(), ParamValue::from("robust"));
    params.insert("tree__max_depth".to_string(), ParamValue::from("deep"));
    assert!(matches!(
        pipe.set_params(&params),
        Err(PipelineError::InvalidParameter { .. })
    ));
    assert_eq!(pipe.get_params()["scaler__kind"], ParamValue::from("robust"));
}

#[test]
fn test_clone_is_independent() {
    let (x, y) = blobs();
    let mut pipe = Pipeline::new(vec![
        Step::transformer("scaler", Scaler::standard()),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();
    let template = pipe.clone();

    pipe.set_param("tree__max_depth", ParamValue::Int(1)).unwrap();
    pipe.fit(&x, &y).unwrap();

    assert!(!template.is_fitted());
    assert_eq!(template.get_params()["tree__max_depth"], ParamValue::None);
}

// ============================================================================
// Error propagation
// ============================================================================

#[test]
fn test_step_errors_surface_unchanged() {
    let (x, y) = blobs();
    let mut pipe = Pipeline::new(vec![
        Step::transformer("pca", Pca::new(5)),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();

    match pipe.fit(&x, &y) {
        Err(PipelineError::InvalidParameter { name, .. }) => assert_eq!(name, "n_components"),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    assert!(!pipe.is_fitted());
}

#[test]
fn test_predict_proba_support() {
    let (x, y) = blobs();
    let mut with_tree = Pipeline::new(vec![
        Step::transformer("scaler", Scaler::standard()),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();
    with_tree.fit(&x, &y).unwrap();
    let proba = with_tree.predict_proba(&x).unwrap();
    assert_eq!(proba.dim(), (15, 3));
    for row in proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-12);
    }

    let mut with_majority = Pipeline::new(vec![Step::estimator("m", MajorityClass::default())]).unwrap();
    with_majority.fit(&x, &y).unwrap();
    assert!(matches!(
        with_majority.predict_proba(&x),
        Err(PipelineError::UnsupportedOperation(_))
    ));
}

#[test]
fn test_nan_features_are_rejected() {
    let x = array![[1.0, f64::NAN], [2.0, 3.0], [3.0, 1.0], [4.0, 2.0]];
    let y = array![0.0, 0.0, 1.0, 1.0];

    let mut with_pca = Pipeline::new(vec![
        Step::transformer("pca", Pca::new(1)),
        Step::estimator("tree", DecisionTreeClassifier::new()),
    ])
    .unwrap();
    assert!(matches!(with_pca.fit(&x, &y), Err(PipelineError::InvalidInput(_))));
    assert!(!with_pca.is_fitted());

    let mut tree_only = Pipeline::new(vec![Step::estimator("tree", DecisionTreeClassifier::new())]).unwrap();
    assert!(matches!(tree_only.fit(&x, &y), Err(PipelineError::InvalidInput(_))));
}
