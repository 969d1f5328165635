use itertools::izip;
use num_traits::ToPrimitive;
use std::cmp::Ordering;

/// This function computes the area under the receiver operating characteristic curve using the trapezoid method. It returns `None` when the labels do not include at least one positive and one negative bag.
pub fn auc_roc(probabilities: &[f64], labels: &[bool]) -> Option<f64> {
	let roc_curve = compute_roc_curve(probabilities, labels)?;
	// Compute the riemann sum of the roc curve.
	let auc = roc_curve
		.windows(2)
		.map(|window| {
			let left = &window[0];
			let right = &window[1];
			let y_average = (left.true_positive_rate + right.true_positive_rate) / 2.0;
			let dx = right.false_positive_rate - left.false_positive_rate;
			y_average * dx
		})
		.sum();
	Some(auc)
}

#[derive(Debug, PartialEq)]
pub struct RocCurvePoint {
	/// The classification threshold.
	pub threshold: f64,
	/// The true positive rate for all predictions with probability >= threshold.
	pub true_positive_rate: f64,
	/// The false positive rate for all predictions with probability >= threshold.
	pub false_positive_rate: f64,
}

/// This function computes the ROC curve, which plots the false positive rate on the x axis and the true positive rate on the y axis for each distinct predicted probability used as a classification threshold.
pub fn compute_roc_curve(probabilities: &[f64], labels: &[bool]) -> Option<Vec<RocCurvePoint>> {
	let count_positives = labels.iter().filter(|label| **label).count();
	let count_negatives = labels.len() - count_positives;
	if count_positives == 0 || count_negatives == 0 {
		return None;
	}
	let count_positives = count_positives.to_f64()?;
	let count_negatives = count_negatives.to_f64()?;
	// Add a point at (0, 0) with a dummy threshold above every probability.
	let mut roc_curve = vec![RocCurvePoint {
		threshold: 1.0,
		true_positive_rate: 0.0,
		false_positive_rate: 0.0,
	}];
	let mut true_positives = 0usize;
	let mut false_positives = 0usize;
	for point in compute_tps_fps_by_threshold(probabilities, labels) {
		true_positives += point.true_positives;
		false_positives += point.false_positives;
		roc_curve.push(RocCurvePoint {
			threshold: point.threshold,
			true_positive_rate: true_positives.to_f64()? / count_positives,
			false_positive_rate: false_positives.to_f64()? / count_negatives,
		});
	}
	Some(roc_curve)
}

#[derive(Debug)]
struct TpsFpsPoint {
	threshold: f64,
	true_positives: usize,
	false_positives: usize,
}

/// Count the true and false positives exactly at each distinct probability, from the highest probability to the lowest.
fn compute_tps_fps_by_threshold(probabilities: &[f64], labels: &[bool]) -> Vec<TpsFpsPoint> {
	let mut probabilities_labels: Vec<(f64, bool)> =
		izip!(probabilities.iter().cloned(), labels.iter().cloned()).collect();
	probabilities_labels.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
	let mut tps_fps: Vec<TpsFpsPoint> = Vec::new();
	for (probability, label) in probabilities_labels {
		let (tp, fp) = if label { (1, 0) } else { (0, 1) };
		match tps_fps.last_mut() {
			// If the probability is the same as the last one, add to the previous bucket.
			Some(last) if (last.threshold - probability).abs() == 0.0 => {
				last.true_positives += tp;
				last.false_positives += fp;
			}
			_ => tps_fps.push(TpsFpsPoint {
				threshold: probability,
				true_positives: tp,
				false_positives: fp,
			}),
		}
	}
	tps_fps
}

#[test]
fn test_roc_curve() {
	let labels = vec![true, true, false, false];
	let probabilities = vec![0.9, 0.4, 0.4, 0.2];
	let roc_curve = compute_roc_curve(&probabilities, &labels).unwrap();
	insta::assert_debug_snapshot!(roc_curve, @r###"
 [
     RocCurvePoint {
         threshold: 1.0,
         true_positive_rate: 0.0,
         false_positive_rate: 0.0,
     },
     RocCurvePoint {
         threshold: 0.9,
         true_positive_rate: 0.5,
         false_positive_rate: 0.0,
     },
     RocCurvePoint {
         threshold: 0.4,
         true_positive_rate: 1.0,
         false_positive_rate: 0.5,
     },
     RocCurvePoint {
         threshold: 0.2,
         true_positive_rate: 1.0,
         false_positive_rate: 1.0,
     },
 ]
 "###);
	let auc = auc_roc(&probabilities, &labels).unwrap();
	assert!((auc - 0.875).abs() < std::f64::EPSILON);
}

#[test]
fn test_auc_roc_single_class() {
	assert_eq!(auc_roc(&[0.1, 0.7], &[true, true]), None);
}
