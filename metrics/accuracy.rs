use super::{mean::Mean, StreamingMetric};

/// The accuracy is the proportion of bags where the predicted label equals the actual label.
#[derive(Debug, Default)]
pub struct Accuracy(Mean);

impl Accuracy {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for Accuracy {
	/// (predicted, actual)
	type Input = (bool, bool);
	type Output = Option<f64>;

	fn update(&mut self, value: Self::Input) {
		self.0.update(if value.0 == value.1 { 1.0 } else { 0.0 })
	}

	fn merge(&mut self, other: Self) {
		self.0.merge(other.0)
	}

	fn finalize(self) -> Option<f64> {
		self.0.finalize()
	}
}

#[test]
fn test_accuracy() {
	let mut accuracy = Accuracy::new();
	accuracy.update((true, true));
	accuracy.update((false, true));
	let mut other = Accuracy::new();
	other.update((false, false));
	other.update((true, true));
	accuracy.merge(other);
	assert_eq!(accuracy.finalize(), Some(0.75));
	assert_eq!(Accuracy::new().finalize(), None);
}
