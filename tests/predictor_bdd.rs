//! BDD tests for the predictor lifecycle.

use classify_serve::{
    ErrorClass, PredictError, PredictionBackend, PredictionResult, Predictor,
};
use image::ImageFormat;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
mod support;
use support::{ChannelMeanLoader, ModelDir, encode, solid_rgb};

#[derive(Default)]
struct PredictorContext {
    dir: RefCell<Option<ModelDir>>,
    predictor: RefCell<Option<Predictor<ChannelMeanLoader>>>,
    outcome: RefCell<Option<Result<PredictionResult, PredictError>>>,
}

impl PredictorContext {
    fn install(&self, dir: ModelDir) {
        self.predictor.replace(Some(dir.predictor(ChannelMeanLoader)));
        self.dir.replace(Some(dir));
    }

    fn submit(&self, bytes: &[u8]) {
        let binding = self.predictor.borrow();
        let predictor = binding
            .as_ref()
            .unwrap_or_else(|| panic!("predictor to be set"));
        self.outcome.replace(Some(predictor.predict(bytes)));
    }

    fn error_class(&self) -> ErrorClass {
        match self.outcome.borrow().as_ref() {
            Some(Err(err)) => err.class(),
            Some(Ok(result)) => panic!("expected failure, got {result:?}"),
            None => panic!("no request submitted"),
        }
    }
}

#[fixture]
fn predictor_context() -> PredictorContext {
    PredictorContext::default()
}

#[given("a loadable colour predictor")]
fn given_predictor(#[from(predictor_context)] ctx: &PredictorContext) {
    ctx.install(ModelDir::new(&["red", "green", "blue"], 8));
}

#[given("a colour predictor whose model file is missing")]
fn given_predictor_without_model(#[from(predictor_context)] ctx: &PredictorContext) {
    ctx.install(ModelDir::new(&["red", "green", "blue"], 8).without_model());
}

#[given("the predictor is initialised")]
fn given_initialised(#[from(predictor_context)] ctx: &PredictorContext) {
    let binding = ctx.predictor.borrow();
    let predictor = binding
        .as_ref()
        .unwrap_or_else(|| panic!("predictor to be set"));
    // A failed load is recorded in the predictor state.
    let _ = predictor.initialize();
}

#[when("a {size:u32} pixel red png is submitted")]
fn when_red_png(size: u32, #[from(predictor_context)] ctx: &PredictorContext) {
    ctx.submit(&encode(&solid_rgb(size, size, [240, 20, 20]), ImageFormat::Png));
}

#[when("a text file is submitted")]
fn when_text(#[from(predictor_context)] ctx: &PredictorContext) {
    ctx.submit(b"leaf photo goes here");
}

#[then("the request fails as unavailable")]
fn then_unavailable(#[from(predictor_context)] ctx: &PredictorContext) {
    assert_eq!(ctx.error_class(), ErrorClass::Unavailable);
}

#[then("the request fails as a client error")]
fn then_client_error(#[from(predictor_context)] ctx: &PredictorContext) {
    assert_eq!(ctx.error_class(), ErrorClass::ClientError);
}

#[then("the predicted class is \"{name}\"")]
#[expect(
    clippy::needless_pass_by_value,
    reason = "BDD macro injects owned value"
)]
fn then_class(name: String, #[from(predictor_context)] ctx: &PredictorContext) {
    match ctx.outcome.borrow().as_ref() {
        Some(Ok(result)) => assert_eq!(result.predicted_class, name),
        other => panic!("expected a prediction, got {other:?}"),
    }
}

#[then("{count:usize} predictions are returned")]
fn then_count(count: usize, #[from(predictor_context)] ctx: &PredictorContext) {
    match ctx.outcome.borrow().as_ref() {
        Some(Ok(result)) => assert_eq!(result.all_predictions.len(), count),
        other => panic!("expected a prediction, got {other:?}"),
    }
}

#[scenario(path = "tests/features/predictor.feature", index = 0)]
fn predict_before_initialise(predictor_context: PredictorContext) {
    let _ = predictor_context;
}

#[scenario(path = "tests/features/predictor.feature", index = 1)]
fn red_is_red(predictor_context: PredictorContext) {
    let _ = predictor_context;
}

#[scenario(path = "tests/features/predictor.feature", index = 2)]
fn text_is_rejected(predictor_context: PredictorContext) {
    let _ = predictor_context;
}

#[scenario(path = "tests/features/predictor.feature", index = 3)]
fn missing_model_is_degraded(predictor_context: PredictorContext) {
    let _ = predictor_context;
}
