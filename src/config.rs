use crate::error::ConfigurationError;
use crate::fem_domain::domain::{
    dof::{Boundary, BoundaryCondition},
    mesh::MAX_POLYNOMIAL_ORDER,
    Space, MAX_EQN_NUM,
};
use crate::fem_problem::{adapt::AdaptType, error_estimation::NormKind};
use json::JsonValue;
use std::fs::read_to_string;

/// Stopping criteria for Newton's method
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewtonConfig {
    /// Newton's method stops once the Euclidean norm of the residual is below this value
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 150,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigurationError::InvalidSetting(
                "newton tolerance",
                self.tolerance.to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigurationError::InvalidSetting(
                "newton max_iterations",
                self.max_iterations.to_string(),
            ));
        }
        Ok(())
    }

    fn from_json(json: &JsonValue) -> Result<Self, ConfigurationError> {
        let default = Self::default();
        Ok(Self {
            tolerance: optional_f64(json, "tolerance")?.unwrap_or(default.tolerance),
            max_iterations: optional_usize(json, "max_iterations")?
                .unwrap_or(default.max_iterations),
        })
    }
}

/// Settings of the adaptivity loop
///
/// All settings are read once at the start of [solve_adaptive](crate::fem_problem::adapt_loop::solve_adaptive)
///
/// ```
/// use fem_1d::prelude::*;
///
/// let config = AdaptConfig::from_json_str(r#"{
///     "adapt_type": "h",
///     "threshold": 0.5,
///     "newton_ref": { "tolerance": 1e-8 }
/// }"#).unwrap();
///
/// assert_eq!(config.adapt_type, AdaptType::H);
/// assert_eq!(config.threshold, 0.5);
/// assert_eq!(config.newton_ref.tolerance, 1e-8);
/// assert_eq!(config.newton_ref.max_iterations, 150);
/// assert_eq!(config.norm, NormKind::H1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptConfig {
    /// Newton settings on the coarse Space
    pub newton_coarse: NewtonConfig,
    /// Newton settings on the reference Space
    pub newton_ref: NewtonConfig,
    pub adapt_type: AdaptType,
    /// Elems with an error of at least `threshold * max_error` are refined
    pub threshold: f64,
    pub norm: NormKind,
    /// The loop stops when the relative error estimate (a fraction) drops below this value
    pub tol_err_rel: f64,
    pub max_steps: usize,
}

impl Default for AdaptConfig {
    fn default() -> Self {
        Self {
            newton_coarse: NewtonConfig::default(),
            newton_ref: NewtonConfig::default(),
            adapt_type: AdaptType::Hp,
            threshold: 0.7,
            norm: NormKind::H1,
            tol_err_rel: 1e-5,
            max_steps: 30,
        }
    }
}

impl AdaptConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.newton_coarse.validate()?;
        self.newton_ref.validate()?;

        if !(self.threshold >= 0.0 && self.threshold <= 1.0) {
            return Err(ConfigurationError::InvalidSetting(
                "threshold",
                self.threshold.to_string(),
            ));
        }
        if !(self.tol_err_rel.is_finite() && self.tol_err_rel > 0.0) {
            return Err(ConfigurationError::InvalidSetting(
                "tol_err_rel",
                self.tol_err_rel.to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ConfigurationError::InvalidSetting(
                "max_steps",
                self.max_steps.to_string(),
            ));
        }
        Ok(())
    }

    /// Parse (and validate) settings from a JSON string. Missing keys take their default values.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigurationError> {
        let json = json::parse(contents).map_err(|err| ConfigurationError::Parse(err.to_string()))?;
        let default = Self::default();

        let config = Self {
            newton_coarse: if json["newton_coarse"].is_null() {
                default.newton_coarse
            } else {
                NewtonConfig::from_json(&json["newton_coarse"])?
            },
            newton_ref: if json["newton_ref"].is_null() {
                default.newton_ref
            } else {
                NewtonConfig::from_json(&json["newton_ref"])?
            },
            adapt_type: match optional_str(&json, "adapt_type")? {
                Some(s) => s.parse()?,
                None => default.adapt_type,
            },
            threshold: optional_f64(&json, "threshold")?.unwrap_or(default.threshold),
            norm: match optional_str(&json, "norm")? {
                Some(s) => s.parse()?,
                None => default.norm,
            },
            tol_err_rel: optional_f64(&json, "tol_err_rel")?.unwrap_or(default.tol_err_rel),
            max_steps: optional_usize(&json, "max_steps")?.unwrap_or(default.max_steps),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<str>) -> Result<Self, ConfigurationError> {
        Self::from_json_str(&read_file(path)?)
    }
}

/// Description of a [Space]: domain, initial Mesh and Boundary Conditions
///
/// Boundary Conditions are given per equation in JSON as a number (Dirichlet value) or `null` (natural)
///
/// ```
/// use fem_1d::prelude::*;
///
/// let config = ProblemConfig::from_json_str(r#"{
///     "domain": [0.0, 2.0],
///     "num_elems": 4,
///     "p_init": 2,
///     "neq": 2,
///     "bc_left": [1.0, null],
///     "bc_right": [0.0, 0.5]
/// }"#).unwrap();
///
/// let mut space = config.build_space().unwrap();
/// assert_eq!(space.get_n_active_elem(), 4);
/// assert_eq!(space.assign_dofs(), 2 * 9 - 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemConfig {
    pub domain: [f64; 2],
    pub num_elems: usize,
    pub p_init: u8,
    pub neq: usize,
    pub bc_left: Vec<BoundaryCondition>,
    pub bc_right: Vec<BoundaryCondition>,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            domain: [-1.0, 1.0],
            num_elems: 2,
            p_init: 1,
            neq: 1,
            bc_left: vec![BoundaryCondition::Dirichlet(0.0)],
            bc_right: vec![BoundaryCondition::Dirichlet(0.0)],
        }
    }
}

impl ProblemConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let [a, b] = self.domain;
        if !(a.is_finite() && b.is_finite() && a < b) {
            return Err(ConfigurationError::InvalidDomain(a, b));
        }
        if self.num_elems == 0 {
            return Err(ConfigurationError::NoElements);
        }
        if self.p_init < 1 || self.p_init > MAX_POLYNOMIAL_ORDER {
            return Err(ConfigurationError::InvalidDegree(
                self.p_init,
                MAX_POLYNOMIAL_ORDER,
            ));
        }
        if self.neq < 1 || self.neq > MAX_EQN_NUM {
            return Err(ConfigurationError::InvalidEquationCount(self.neq, MAX_EQN_NUM));
        }
        for bcs in [&self.bc_left, &self.bc_right] {
            if bcs.len() > self.neq {
                return Err(ConfigurationError::EquationOutOfRange(bcs.len() - 1, self.neq));
            }
            for (eq, bc) in bcs.iter().enumerate() {
                if let BoundaryCondition::Dirichlet(value) = bc {
                    if !value.is_finite() {
                        return Err(ConfigurationError::NonFiniteDirichletValue(eq));
                    }
                }
            }
        }
        Ok(())
    }

    /// Construct the [Space] described by this configuration
    ///
    /// Equations without a listed Boundary Condition are natural on that end.
    pub fn build_space(&self) -> Result<Space, ConfigurationError> {
        self.validate()?;

        let mut space = Space::new(
            self.domain[0],
            self.domain[1],
            self.num_elems,
            self.p_init,
            self.neq,
        )?;

        for (boundary, bcs) in [(Boundary::Left, &self.bc_left), (Boundary::Right, &self.bc_right)] {
            for (eq, bc) in bcs.iter().enumerate() {
                space.set_bc(eq, boundary, *bc)?;
            }
        }

        space.assign_dofs();
        Ok(space)
    }

    /// Parse (and validate) a problem description from a JSON string
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigurationError> {
        let json = json::parse(contents).map_err(|err| ConfigurationError::Parse(err.to_string()))?;
        let default = Self::default();

        let domain = if json["domain"].is_null() {
            default.domain
        } else {
            let bounds = json["domain"]
                .members()
                .map(|bound| {
                    bound.as_f64().ok_or_else(|| {
                        ConfigurationError::Parse("domain must contain numerical values".to_string())
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            match bounds[..] {
                [a, b] => [a, b],
                _ => {
                    return Err(ConfigurationError::Parse(
                        "domain must be an array of length 2".to_string(),
                    ))
                }
            }
        };

        let p_init = match optional_usize(&json, "p_init")? {
            Some(p) => u8::try_from(p)
                .map_err(|_| ConfigurationError::InvalidDegree(u8::MAX, MAX_POLYNOMIAL_ORDER))?,
            None => default.p_init,
        };

        let config = Self {
            domain,
            num_elems: optional_usize(&json, "num_elems")?.unwrap_or(default.num_elems),
            p_init,
            neq: optional_usize(&json, "neq")?.unwrap_or(default.neq),
            bc_left: parse_bcs(&json, "bc_left")?.unwrap_or(default.bc_left),
            bc_right: parse_bcs(&json, "bc_right")?.unwrap_or(default.bc_right),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<str>) -> Result<Self, ConfigurationError> {
        Self::from_json_str(&read_file(path)?)
    }
}

fn read_file(path: impl AsRef<str>) -> Result<String, ConfigurationError> {
    read_to_string(path.as_ref())
        .map_err(|err| ConfigurationError::Io(format!("{}: {}", path.as_ref(), err)))
}

fn optional_f64(json: &JsonValue, key: &'static str) -> Result<Option<f64>, ConfigurationError> {
    if json[key].is_null() {
        Ok(None)
    } else {
        json[key]
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConfigurationError::InvalidSetting(key, json[key].dump()))
    }
}

fn optional_usize(json: &JsonValue, key: &'static str) -> Result<Option<usize>, ConfigurationError> {
    if json[key].is_null() {
        Ok(None)
    } else {
        json[key]
            .as_usize()
            .map(Some)
            .ok_or_else(|| ConfigurationError::InvalidSetting(key, json[key].dump()))
    }
}

fn optional_str<'a>(
    json: &'a JsonValue,
    key: &'static str,
) -> Result<Option<&'a str>, ConfigurationError> {
    if json[key].is_null() {
        Ok(None)
    } else {
        json[key]
            .as_str()
            .map(Some)
            .ok_or_else(|| ConfigurationError::InvalidSetting(key, json[key].dump()))
    }
}

fn parse_bcs(
    json: &JsonValue,
    key: &'static str,
) -> Result<Option<Vec<BoundaryCondition>>, ConfigurationError> {
    if json[key].is_null() {
        return Ok(None);
    }
    if !json[key].is_array() {
        return Err(ConfigurationError::InvalidSetting(key, json[key].dump()));
    }

    json[key]
        .members()
        .map(|bc| {
            if bc.is_null() {
                Ok(BoundaryCondition::Natural)
            } else {
                bc.as_f64()
                    .map(BoundaryCondition::Dirichlet)
                    .ok_or_else(|| ConfigurationError::InvalidSetting(key, bc.dump()))
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AdaptConfig::default().validate().is_ok());
        assert!(ProblemConfig::default().validate().is_ok());

        let config = AdaptConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AdaptConfig::default());
    }

    #[test]
    fn invalid_settings() {
        let config = AdaptConfig {
            threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigurationError::InvalidSetting("threshold", "1.5".to_string())
        );

        assert!(matches!(
            AdaptConfig::from_json_str(r#"{ "newton_coarse": { "max_iterations": 0 } }"#),
            Err(ConfigurationError::InvalidSetting("newton max_iterations", _))
        ));
        assert!(matches!(
            AdaptConfig::from_json_str(r#"{ "norm": "h2" }"#),
            Err(ConfigurationError::InvalidSetting("norm", _))
        ));
        assert!(matches!(
            AdaptConfig::from_json_str(r#"{ "threshold": "high" }"#),
            Err(ConfigurationError::InvalidSetting("threshold", _))
        ));
        assert!(matches!(
            AdaptConfig::from_json_str("{ threshold: }"),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn problem_parsing() {
        let config = ProblemConfig::from_json_str(
            r#"{ "domain": [0, 1], "num_elems": 3, "bc_left": [2.5], "bc_right": [null] }"#,
        )
        .unwrap();

        assert_eq!(config.domain, [0.0, 1.0]);
        assert_eq!(config.p_init, 1);
        assert_eq!(config.bc_left, vec![BoundaryCondition::Dirichlet(2.5)]);
        assert_eq!(config.bc_right, vec![BoundaryCondition::Natural]);

        let space = config.build_space().unwrap();
        assert_eq!(space.get_num_dofs(), 3);
        assert_eq!(space.first_active_element().coeffs(0)[0], 2.5);
    }

    #[test]
    fn problem_errors() {
        assert_eq!(
            ProblemConfig::from_json_str(r#"{ "neq": 11 }"#).unwrap_err(),
            ConfigurationError::InvalidEquationCount(11, MAX_EQN_NUM)
        );
        assert_eq!(
            ProblemConfig::from_json_str(r#"{ "bc_left": [0.0, 1.0] }"#).unwrap_err(),
            ConfigurationError::EquationOutOfRange(1, 1)
        );
        assert!(matches!(
            ProblemConfig::from_json_str(r#"{ "domain": [0.0] }"#),
            Err(ConfigurationError::Parse(_))
        ));
        assert!(matches!(
            ProblemConfig::from_file("./does/not/exist.json"),
            Err(ConfigurationError::Io(_))
        ));
    }
}
