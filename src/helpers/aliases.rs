use nalgebra::Vector3;

pub type Vec3u = Vector3<usize>;
