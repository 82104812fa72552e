//! Utilities.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};

/// Joint L2 norm of the gradients of `vars`. Variables without gradient are skipped.
pub fn grad_norm(grads: &GradStore, vars: &[Var]) -> Result<f32> {
    let mut sq = 0f32;
    for var in vars.iter() {
        if let Some(g) = grads.get(var.as_tensor()) {
            sq += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    Ok(sq.sqrt())
}

/// Rescales the gradients of `vars` so that their joint L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let norm = grad_norm(grads, vars)?;
    let scale = max_norm / (norm as f64 + 1e-6);
    if scale < 1.0 {
        for var in vars.iter() {
            let g = match grads.get(var.as_tensor()) {
                Some(g) => (g * scale)?,
                None => continue,
            };
            grads.insert(var.as_tensor(), g);
        }
    }
    Ok(norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let x = Var::new(&[3.0f32, 4.0], &Device::Cpu)?;
        let y = Var::new(&[1.0f32], &Device::Cpu)?;
        // d/dx sum(x^2 / 2) = x
        let loss = ((x.as_tensor().sqr()?.sum_all()? * 0.5)? + y.as_tensor().sum_all()?)?;
        let mut grads = loss.backward()?;

        let norm = clip_grad_norm(&mut grads, &[x.clone()], 1.0)?;
        assert!((norm - 5.0).abs() < 1e-5);
        let g = grads.get(x.as_tensor()).unwrap().to_vec1::<f32>()?;
        assert!((g[0] - 0.6).abs() < 1e-5 && (g[1] - 0.8).abs() < 1e-5);

        // Other groups are untouched.
        let gy = grads.get(y.as_tensor()).unwrap().to_vec1::<f32>()?;
        assert_eq!(gy, vec![1.0]);

        // Small gradients are kept.
        let norm = clip_grad_norm(&mut grads, &[y.clone()], 100.0)?;
        assert_eq!(norm, 1.0);
        assert_eq!(grads.get(y.as_tensor()).unwrap().to_vec1::<f32>()?, vec![1.0]);
        Ok(())
    }
}
