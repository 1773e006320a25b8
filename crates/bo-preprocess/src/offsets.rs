use bo_types::{ExperimentRecord, PreprocessError};

/// Shift objective values so that each source's true minimum sits at zero.
///
/// Predictions and best acquisitions are measured against the primary
/// source. Samples of single-source runs use that same offset; otherwise each
/// sample uses the offset of the source that produced it, and samples tagged
/// with an unknown source are left untouched.
pub fn subtract_true_minimum(record: &mut ExperimentRecord) -> Result<(), PreprocessError> {
    let offsets: Vec<f64> = record.truemin.iter().map(|t| t.value).collect();
    let Some(&primary) = offsets.first() else {
        return Err(PreprocessError::MissingTrueMinimum {
            name: record.name.clone(),
        });
    };

    for prediction in &mut record.gmp {
        prediction.mean -= primary;
    }
    for acquisition in &mut record.best_acq {
        acquisition.value -= primary;
    }

    if offsets.len() == 1 {
        for sample in &mut record.xy {
            sample.value -= primary;
        }
    } else {
        for sample in &mut record.xy {
            if let Some(offset) = offsets.get(sample.source) {
                sample.value -= offset;
            }
        }
    }

    Ok(())
}
