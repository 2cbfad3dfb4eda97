use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use bytes::{BufMut, BytesMut};
use nalgebra::DMatrix;

/// PETSc's class id for binary matrix files
const PETSC_MAT_FILE_CLASSID: u32 = 1211216;

/// Wrapper around a BTreeMap to store square matrices in a sparse data structure
///
/// Entries are keyed by `[row, col]`. Repeated insertions into the same entry are summed.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    /// Size of the square matrix
    pub dimension: usize,
    /// Matrix Entries
    entries: BTreeMap<[u32; 2], f64>,
}

impl SparseMatrix {
    pub fn new(dimension: usize) -> Self {
        assert!(
            dimension <= (std::u32::MAX as usize),
            "Matrix Dimension cannot exceed the size of a u32!"
        );

        Self {
            dimension,
            entries: BTreeMap::new(),
        }
    }

    /// Number of stored entries
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    fn coordinates(&self, [row_idx, col_idx]: [usize; 2]) -> [u32; 2] {
        assert!(
            row_idx < self.dimension,
            "row_idx exceeded matrix dimension; cannot insert value!"
        );
        assert!(
            col_idx < self.dimension,
            "col_idx exceeded matrix dimension; cannot insert value!"
        );
        // both indices are bounded by the dimension, which fits in a u32
        [row_idx as u32, col_idx as u32]
    }

    /// Add a value into the matrix at `[row, col]`
    pub fn insert(&mut self, rc: [usize; 2], value: f64) {
        let coordinates = self.coordinates(rc);
        self.entries
            .entry(coordinates)
            .and_modify(|curr_val| *curr_val += value)
            .or_insert(value);
    }

    /// Add a batch of local contributions
    pub fn insert_group(&mut self, entry_group: Vec<([usize; 2], f64)>) {
        entry_group
            .into_iter()
            .for_each(|(rc, value)| self.insert(rc, value));
    }

    /// Value at `[row, col]` (zero if the entry is not stored)
    pub fn get(&self, rc: [usize; 2]) -> f64 {
        self.entries
            .get(&self.coordinates(rc))
            .cloned()
            .unwrap_or(0.0)
    }

    /// Iterate over the stored entries, sorted by row then column
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 2], f64)> + '_ {
        self.entries
            .iter()
            .map(|(coords, value)| ([coords[0] as usize, coords[1] as usize], *value))
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.dimension,
            "Vector length does not match matrix dimension; cannot multiply!"
        );
        let mut y = vec![0.0; self.dimension];
        for ([r, c], v) in self.iter() {
            y[r] += v * x[c];
        }
        y
    }

    /// Write the matrix to a file in PETSc's binary AIJ format
    pub fn write_petsc_binary(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        AIJMatrixBinary::from(self).print_to_petsc_binary_file(path)
    }
}

impl From<&SparseMatrix> for DMatrix<f64> {
    fn from(sm: &SparseMatrix) -> Self {
        let mut dense = DMatrix::zeros(sm.dimension, sm.dimension);
        for ([r, c], v) in sm.iter() {
            dense[(r, c)] = v;
        }
        dense
    }
}

impl From<&SparseMatrix> for AIJMatrixBinary {
    fn from(sm: &SparseMatrix) -> Self {
        // number of entries in each row
        let mut row_counts = vec![0; sm.dimension];
        for [r, _] in sm.entries.keys() {
            row_counts[*r as usize] += 1;
        }

        // entries are already sorted by row then column
        let (j, a) = sm.entries.iter().map(|([_, c], v)| (*c as i32, *v)).unzip();

        AIJMatrixBinary {
            a,
            i: row_counts,
            j,
            dim: sm.dimension,
        }
    }
}

/// PETSc AIJ (compressed row) layout of a [SparseMatrix]
pub struct AIJMatrixBinary {
    pub a: Vec<f64>,
    /// entries per row (a prefix sum gives the usual CSR row pointers)
    pub i: Vec<i32>,
    pub j: Vec<i32>,
    pub dim: usize,
}

impl AIJMatrixBinary {
    pub fn print_to_petsc_binary_file(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.to_bytes().as_ref())?;
        writer.flush()
    }

    /// Big-endian encoding: header, row counts, column indices, then values
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf =
            BytesMut::with_capacity(16 + self.i.len() * 4 + self.j.len() * 4 + self.a.len() * 8);

        // header
        buf.put_u32(PETSC_MAT_FILE_CLASSID);
        buf.put_u32(self.dim as u32);
        buf.put_u32(self.dim as u32);
        buf.put_u32(self.a.len() as u32);

        // num-non-zero entries on each row
        for &rnz in self.i.iter() {
            buf.put_i32(rnz);
        }

        // column indices of non-zero entries
        for &j in self.j.iter() {
            buf.put_i32(j);
        }

        // non-zero entries
        for &a in self.a.iter() {
            buf.put_f64(a);
        }

        buf
    }
}
