use super::ShapeFn;

/// Hierarchic, H1-conforming Shape Functions built from integrated Legendre Polynomials
///
/// * `l_0 = (1 - x) / 2`
/// * `l_1 = (1 + x) / 2`
/// * `l_n = (P_n - P_{n-2}) / sqrt(2(2n - 1))` for `n >= 2`
///
/// The bubble functions (`n >= 2`) have derivatives which are orthonormal over `[-1, 1]`
#[derive(Clone, Debug)]
pub struct LobattoShapeFn {
    values: Vec<Vec<f64>>,
    d1: Vec<Vec<f64>>,
}

impl ShapeFn for LobattoShapeFn {
    fn with(n_max: usize, points: &[f64]) -> Self {
        let leg = LegendrePoly::with(n_max, points);
        let mut values = Vec::with_capacity(n_max + 1);
        let mut d1 = Vec::with_capacity(n_max + 1);

        for n in 0..=n_max {
            match n {
                0 => {
                    values.push(points.iter().map(|x| (1.0 - x) / 2.0).collect());
                    d1.push(vec![-0.5; points.len()]);
                }
                1 => {
                    values.push(points.iter().map(|x| (1.0 + x) / 2.0).collect());
                    d1.push(vec![0.5; points.len()]);
                }
                _ => {
                    let n_f = n as f64;
                    let v_scale = 1.0 / (2.0 * (2.0 * n_f - 1.0)).sqrt();
                    let d_scale = ((2.0 * n_f - 1.0) / 2.0).sqrt();

                    values.push(
                        leg.l[n]
                            .iter()
                            .zip(leg.l[n - 2].iter())
                            .map(|(p_n, p_nm2)| (p_n - p_nm2) * v_scale)
                            .collect(),
                    );
                    d1.push(leg.l[n - 1].iter().map(|p_nm1| p_nm1 * d_scale).collect());
                }
            }
        }

        Self { values, d1 }
    }

    fn value(&self, n: usize, p: usize) -> f64 {
        self.values[n][p]
    }

    fn d1(&self, n: usize, p: usize) -> f64 {
        self.d1[n][p]
    }

    fn max_n(&self) -> usize {
        self.values.len() - 1
    }

    fn num_points(&self) -> usize {
        self.values.first().map_or(0, |v| v.len())
    }
}

/// Legendre Polynomials sampled over a set of points
#[derive(Clone, Debug)]
pub struct LegendrePoly {
    pub l: Vec<Vec<f64>>,
}

impl LegendrePoly {
    pub fn with(max_n: usize, points: &[f64]) -> Self {
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(max_n + 1);

        for i in 0..=max_n {
            values.push(Vec::with_capacity(points.len()));

            let i_f = i as f64;
            for (p, &point) in points.iter().enumerate() {
                match i {
                    0 => values[i].push(1.0),
                    1 => values[i].push(point),
                    _ => {
                        let v = ((2.0 * i_f - 1.0) * point * values[i - 1][p]
                            - (i_f - 1.0) * values[i - 2][p])
                            / i_f;
                        values[i].push(v);
                    }
                }
            }
        }

        Self { l: values }
    }
}
