//! Versioned model snapshots and named parameter tables.
use crate::error::FedkickError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name and shape of one parameter tensor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Name of the tensor, e.g. `dense_2.weight`.
    pub name: String,

    /// Shape of the tensor.
    pub shape: Vec<usize>,
}

impl ParamSpec {
    /// Creates a parameter spec.
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Number of values in the flattened tensor.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// The canonical model of one participant.
///
/// `version` is bumped by exactly one on every aggregation that consumed at
/// least one delta. Weights are flat, row-major buffers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Version of the model.
    pub version: u64,

    /// Ordered list of parameter tensors.
    pub spec: Vec<ParamSpec>,

    /// Flat values of each parameter tensor.
    pub weights: BTreeMap<String, Vec<f32>>,
}

impl Model {
    /// Parameter specs of a stack of dense layers `dense_0 .. dense_n`.
    ///
    /// Weights are laid out as `[out, in]`, biases as `[out]`.
    pub fn dense_spec(in_dim: usize, hidden: &[usize], out_dim: usize) -> Vec<ParamSpec> {
        let mut dims = vec![in_dim];
        dims.extend_from_slice(hidden);
        dims.push(out_dim);

        dims.windows(2)
            .enumerate()
            .flat_map(|(i, w)| {
                vec![
                    ParamSpec::new(format!("dense_{}.weight", i), vec![w[1], w[0]]),
                    ParamSpec::new(format!("dense_{}.bias", i), vec![w[1]]),
                ]
            })
            .collect()
    }

    /// Creates a model at version 0 with values drawn uniformly from
    /// `[-scale, scale)` by a generator seeded with `seed`.
    pub fn init(spec: Vec<ParamSpec>, seed: u64, scale: f32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let weights = spec
            .iter()
            .map(|p| {
                let values = (0..p.numel())
                    .map(|_| (rng.gen::<f32>() * 2.0 - 1.0) * scale)
                    .collect();
                (p.name.clone(), values)
            })
            .collect();

        Self {
            version: 0,
            spec,
            weights,
        }
    }

    /// Returns the spec of the named parameter.
    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.spec.iter().find(|p| p.name == name)
    }

    /// Builds a parameter table in spec order.
    ///
    /// Fails if a declared parameter is missing or has the wrong length.
    pub fn param_table(&self) -> Result<ParamTable, FedkickError> {
        let mut table = ParamTable::default();
        for p in self.spec.iter() {
            let values = self.weights.get(&p.name).ok_or_else(|| FedkickError::ShapeMismatch {
                name: p.name.clone(),
                expected: p.numel(),
                actual: 0,
            })?;
            table.push(NamedParam::new(p.name.clone(), p.shape.clone(), values.clone())?);
        }
        Ok(table)
    }

    /// Replaces the weights with the values of the table.
    pub fn set_weights(&mut self, table: ParamTable) {
        for p in table.params.into_iter() {
            self.weights.insert(p.name, p.values);
        }
    }
}

/// A parameter tensor with its values.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedParam {
    /// Name of the tensor.
    pub name: String,

    /// Shape of the tensor.
    pub shape: Vec<usize>,

    /// Flat values.
    pub values: Vec<f32>,
}

impl NamedParam {
    /// Creates a named tensor, checking the length against the shape.
    pub fn new(
        name: impl Into<String>,
        shape: Vec<usize>,
        values: Vec<f32>,
    ) -> Result<Self, FedkickError> {
        let name = name.into();
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(FedkickError::ShapeMismatch {
                name,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            name,
            shape,
            values,
        })
    }
}

/// Ordered list of named tensors with a name index built on insertion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamTable {
    params: Vec<NamedParam>,
    index: HashMap<String, usize>,
}

impl ParamTable {
    /// Appends a tensor, replacing one with the same name.
    pub fn push(&mut self, p: NamedParam) {
        match self.index.get(&p.name) {
            Some(&i) => self.params[i] = p,
            None => {
                self.index.insert(p.name.clone(), self.params.len());
                self.params.push(p);
            }
        }
    }

    /// Looks up a tensor by name.
    pub fn get(&self, name: &str) -> Option<&NamedParam> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Looks up a tensor by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut NamedParam> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.params[i]),
            None => None,
        }
    }

    /// Iterates over the tensors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedParam> {
        self.params.iter()
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the table holds no tensor.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Element-wise `self - before` for every tensor of `self`.
    pub fn diff(&self, before: &ParamTable) -> Result<BTreeMap<String, Vec<f32>>, FedkickError> {
        self.params
            .iter()
            .map(|after| {
                let prev = before
                    .get(&after.name)
                    .ok_or_else(|| FedkickError::UnknownParam(after.name.clone()))?;
                if prev.values.len() != after.values.len() {
                    return Err(FedkickError::ShapeMismatch {
                        name: after.name.clone(),
                        expected: after.values.len(),
                        actual: prev.values.len(),
                    });
                }
                let d = after
                    .values
                    .iter()
                    .zip(prev.values.iter())
                    .map(|(a, b)| a - b)
                    .collect();
                Ok((after.name.clone(), d))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dense_spec() {
        let spec = Model::dense_spec(34, &[128, 128], 10);
        let names: Vec<&str> = spec.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "dense_0.weight",
                "dense_0.bias",
                "dense_1.weight",
                "dense_1.bias",
                "dense_2.weight",
                "dense_2.bias"
            ]
        );
        assert_eq!(spec[0].shape, vec![128, 34]);
        assert_eq!(spec[4].shape, vec![10, 128]);
        assert_eq!(spec[5].numel(), 10);
    }

    #[test]
    fn test_init_is_deterministic_and_small() {
        let spec = Model::dense_spec(4, &[8], 3);
        let m1 = Model::init(spec.clone(), 424242, 0.05);
        let m2 = Model::init(spec, 424242, 0.05);
        assert_eq!(m1, m2);
        assert_eq!(m1.version, 0);

        let all: Vec<f32> = m1.weights.values().flatten().copied().collect();
        assert_eq!(all.len(), 4 * 8 + 8 + 8 * 3 + 3);
        assert!(all.iter().all(|v| v.abs() <= 0.05));
        let mean = all.iter().sum::<f32>() / all.len() as f32;
        assert!(mean.abs() < 0.02);
    }

    #[test]
    fn test_param_table_follows_spec_order() {
        let model = Model::init(Model::dense_spec(2, &[3], 2), 1, 0.1);
        let table = model.param_table().unwrap();
        let names: Vec<&str> = table.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dense_0.weight", "dense_0.bias", "dense_1.weight", "dense_1.bias"]);
        assert_eq!(table.get("dense_1.weight").unwrap().values.len(), 6);
    }

    #[test]
    fn test_param_table_rejects_bad_length() {
        let mut model = Model::init(Model::dense_spec(2, &[3], 2), 1, 0.1);
        model.weights.insert("dense_1.bias".into(), vec![0.0; 5]);
        assert!(model.param_table().is_err());
    }

    #[test]
    fn test_diff() {
        let mut before = ParamTable::default();
        before.push(NamedParam::new("b", vec![2], vec![1.0, 2.0]).unwrap());
        let mut after = before.clone();
        after.get_mut("b").unwrap().values = vec![1.5, 1.0];
        let d = after.diff(&before).unwrap();
        assert_eq!(d["b"], vec![0.5, -1.0]);
    }
}
