use crate::{
    dendrogram::{Dendrogram, Structure},
    traits::FluxValue,
};
use std::path::Path as FilePath;
use svg::{
    node::element::{path::Data, Path},
    Document,
};

///
/// Renders a dendrogram as the classic merge-tree diagram: every leaf
/// gets a horizontal slot and a vertical line rising to its peak flux,
/// every branch a horizontal connector spanning its children at the
/// saddle flux. The y axis is flux, peaks at the top.
///
pub struct DendrogramPlot {
    spacing: f64,
    stroke_width: f64,
    height: f64,
    margin: f64,
}

impl Default for DendrogramPlot {
    fn default() -> Self {
        Self {
            spacing: 10.0,
            stroke_width: 1.0,
            height: 400.0,
            margin: 10.0,
        }
    }
}

impl DendrogramPlot {
    pub fn new() -> Self {
        Default::default()
    }

    /// Horizontal distance between leaf slots
    pub fn spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn stroke_width(mut self, stroke_width: f64) -> Self {
        self.stroke_width = stroke_width;
        self
    }

    /// Document height; the flux range is scaled to fit
    pub fn height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn to_document<T: FluxValue>(&self, dendrogram: &Dendrogram<T>) -> Document {
        // line segments in (slot, flux) space
        let mut segments = Vec::new();
        let mut next_slot = 0.0;
        for root in dendrogram.trunk() {
            let base = num_traits::cast::<T, f64>(root.fmin()).unwrap();
            self.layout(root, base, &mut next_slot, &mut segments);
        }

        if segments.is_empty() {
            return Document::new();
        }

        let (flux_min, flux_max) = segments.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(min, max), &[_, f0, _, f1]| (min.min(f0.min(f1)), max.max(f0.max(f1))),
        );

        let width = (next_slot - 1.0) * self.spacing + 2.0 * self.margin;
        let scale = if flux_max > flux_min {
            (self.height - 2.0 * self.margin) / (flux_max - flux_min)
        } else {
            1.0
        };
        let to_x = |slot: f64| self.margin + slot * self.spacing;
        let to_y = |flux: f64| self.margin + (flux_max - flux) * scale;

        let data = segments.iter().fold(Data::new(), |data, &[x0, f0, x1, f1]| {
            data.move_to((to_x(x0), to_y(f0))).line_to((to_x(x1), to_y(f1)))
        });

        let path = Path::new()
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", self.stroke_width)
            .set("d", data);

        Document::new()
            .set("width", width)
            .set("height", self.height)
            .add(path)
    }

    pub fn save_to_file<T: FluxValue>(
        &self,
        dendrogram: &Dendrogram<T>,
        path: &FilePath,
    ) -> std::io::Result<()> {
        svg::save(path, &self.to_document(dendrogram))
    }

    /// Positions the subtree and returns its horizontal slot. `base` is
    /// the flux the item's vertical line starts from: the parent's
    /// saddle, or the item's own lowest flux for trunk roots.
    fn layout<T: FluxValue>(
        &self,
        item: &Structure<T>,
        base: f64,
        next_slot: &mut f64,
        segments: &mut Vec<[f64; 4]>,
    ) -> f64 {
        match item {
            Structure::Leaf(leaf) => {
                let slot = *next_slot;
                *next_slot += 1.0;

                let peak = num_traits::cast::<T, f64>(leaf.fmax()).unwrap();
                segments.push([slot, base, slot, peak]);
                slot
            }
            Structure::Branch(branch) => {
                let saddle = num_traits::cast::<T, f64>(branch.seed().flux).unwrap();

                let slots: Vec<f64> = branch
                    .children()
                    .iter()
                    .map(|child| self.layout(child, saddle, next_slot, segments))
                    .collect();

                let first = slots[0];
                let last = slots[slots.len() - 1];
                let centre = (first + last) / 2.0;

                segments.push([first, saddle, last, saddle]);
                segments.push([centre, base, centre, saddle]);
                centre
            }
        }
    }
}
