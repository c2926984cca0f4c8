pub use self::camera::Camera;

mod camera;
