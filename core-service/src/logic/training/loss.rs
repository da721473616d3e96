//! Masked softmax cross-entropy

use ndarray::Array2;

use crate::logic::model::network::softmax_rows;

/// Loss and accuracy over a node subset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub loss: f32,
    pub accuracy: f32,
}

fn argmax_row(row: ndarray::ArrayView1<'_, f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Mean cross-entropy and accuracy on `rows`; zero for an empty subset
pub fn masked_metrics(logits: &Array2<f32>, labels: &[usize], rows: &[usize]) -> Metrics {
    if rows.is_empty() {
        return Metrics { loss: 0.0, accuracy: 0.0 };
    }

    let probs = softmax_rows(logits);
    let mut loss = 0.0f64;
    let mut correct = 0usize;
    for &i in rows {
        let p = probs[[i, labels[i]]].max(f32::MIN_POSITIVE);
        loss -= (p as f64).ln();
        if argmax_row(logits.row(i)) == labels[i] {
            correct += 1;
        }
    }

    Metrics {
        loss: (loss / rows.len() as f64) as f32,
        accuracy: correct as f32 / rows.len() as f32,
    }
}

/// Metrics plus d loss / d logits; rows outside `rows` get zero gradient
pub fn cross_entropy(logits: &Array2<f32>, labels: &[usize], rows: &[usize]) -> (Metrics, Array2<f32>) {
    let metrics = masked_metrics(logits, labels, rows);
    let mut grad = Array2::zeros(logits.raw_dim());
    if rows.is_empty() {
        return (metrics, grad);
    }

    let probs = softmax_rows(logits);
    let scale = 1.0 / rows.len() as f32;
    for &i in rows {
        let mut g = grad.row_mut(i);
        g.assign(&probs.row(i));
        g[labels[i]] -= 1.0;
        g *= scale;
    }

    (metrics, grad)
}
