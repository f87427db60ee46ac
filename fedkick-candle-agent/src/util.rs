//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{DType, Tensor, Var};
use candle_nn::VarMap;
use fedkick_core::{error::FedkickError, NamedParam, ParamTable};
use log::trace;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::MutexGuard,
};

/// Critic loss type.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss.
    #[default]
    SmoothL1,
}

fn lock(varmap: &VarMap) -> Result<MutexGuard<'_, HashMap<String, Var>>> {
    varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Variable map lock is poisoned"))
}

/// Copies every variable of `src` into the variable of the same name in `dest`.
pub fn copy_varmap(dest: &VarMap, src: &VarMap) -> Result<()> {
    trace!("copy_varmap");
    let dest = lock(dest)?;
    let src = lock(src)?;

    for (k, v_dest) in dest.iter() {
        let v_src = src
            .get(k)
            .ok_or_else(|| FedkickError::UnknownParam(k.clone()))?;
        v_dest.set(v_src.as_tensor())?;
    }

    Ok(())
}

/// Reads the variables whose names start with `prefix` into a table sorted by name.
pub fn varmap_to_table(varmap: &VarMap, prefix: &str) -> Result<ParamTable> {
    let data = lock(varmap)?;
    let mut names: Vec<&String> = data.keys().filter(|k| k.starts_with(prefix)).collect();
    names.sort();

    let mut table = ParamTable::default();
    for name in names {
        let t = data[name].as_tensor();
        let shape = t.dims().to_vec();
        let values = t.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        table.push(NamedParam::new(name.clone(), shape, values)?);
    }

    Ok(table)
}

/// Overwrites variables with the values of the table.
///
/// Every tensor of the table must name an existing variable of the same shape.
pub fn set_varmap_from_table(varmap: &VarMap, table: &ParamTable) -> Result<()> {
    let data = lock(varmap)?;

    for p in table.iter() {
        let var = data
            .get(&p.name)
            .ok_or_else(|| FedkickError::UnknownParam(p.name.clone()))?;
        let dims = var.as_tensor().dims();
        if dims != p.shape.as_slice() {
            return Err(FedkickError::ShapeMismatch {
                name: p.name.clone(),
                expected: dims.iter().product(),
                actual: p.values.len(),
            }
            .into());
        }
        let t = Tensor::from_slice(&p.values, dims, var.as_tensor().device())?;
        var.set(&t)?;
    }

    Ok(())
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1_loss(x: &Tensor, y: &Tensor) -> Result<Tensor, candle_core::Error> {
    let device = x.device();
    let d = (x - y)?.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(DType::F32)?.to_device(device)?;
    let m2 = Tensor::ones_like(&m1)?.sub(&m1)?;
    (((0.5 * m1)? * d.powf(2.0))? + m2 * (d - 0.5))?.mean_all()
}
