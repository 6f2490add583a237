//! N×N windows of grid ids streamed by a playing client.

use super::error::LiveError;
use crate::coord::Coord;

/// Square window of grid ids around the player, indexed `[x][y]`.
///
/// Empty strings mark cells the client has not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridWindow {
    cells: Vec<Vec<String>>,
}

impl GridWindow {
    /// Builds a window, checking that it is square and non-empty.
    pub fn new(cells: Vec<Vec<String>>) -> Result<Self, LiveError> {
        let size = cells.len();
        if size == 0 {
            return Err(LiveError::MalformedWindow("window is empty".into()));
        }
        if let Some(column) = cells.iter().position(|c| c.len() != size) {
            return Err(LiveError::MalformedWindow(format!(
                "column {} has {} cells, expected {}",
                column,
                cells[column].len(),
                size
            )));
        }
        Ok(Self { cells })
    }

    /// Side length N.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Index of the centre cell on both axes.
    pub fn center(&self) -> usize {
        self.size() / 2
    }

    /// Grid id at `(x, y)`, if the cell is loaded.
    pub fn id_at(&self, x: usize, y: usize) -> Option<&str> {
        self.cells
            .get(x)
            .and_then(|column| column.get(y))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Loaded cells as `(cell offset, grid id)`.
    pub fn cells(&self) -> impl Iterator<Item = (Coord, &str)> {
        self.cells.iter().enumerate().flat_map(|(x, column)| {
            column
                .iter()
                .enumerate()
                .filter(|(_, id)| !id.is_empty())
                .map(move |(y, id)| (Coord::new(x as i32, y as i32), id.as_str()))
        })
    }

    /// Coordinate of cell `(0, 0)` when the centre sits at the origin.
    pub fn centered_origin(&self) -> Coord {
        let c = self.center() as i32;
        Coord::new(-c, -c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Vec<String>> {
        (0..n)
            .map(|x| (0..n).map(|y| format!("{x}-{y}")).collect())
            .collect()
    }

    #[test]
    fn test_window_shape() {
        let window = GridWindow::new(ids(3)).unwrap();
        assert_eq!(window.size(), 3);
        assert_eq!(window.center(), 1);
        assert_eq!(window.id_at(2, 0), Some("2-0"));
        assert_eq!(window.id_at(3, 0), None);
        assert_eq!(window.centered_origin(), Coord::new(-1, -1));
        assert_eq!(window.cells().count(), 9);
    }

    #[test]
    fn test_rejects_ragged_and_empty() {
        let mut ragged = ids(3);
        ragged[1].pop();
        assert!(matches!(
            GridWindow::new(ragged),
            Err(LiveError::MalformedWindow(_))
        ));
        assert!(GridWindow::new(Vec::new()).is_err());
    }

    #[test]
    fn test_empty_cells_skipped() {
        let mut cells = ids(3);
        cells[0][0].clear();
        let window = GridWindow::new(cells).unwrap();
        assert_eq!(window.id_at(0, 0), None);
        assert_eq!(window.cells().count(), 8);
    }
}
