//! Class templates: builders in `-rb.ipp`, one registration per instantiation.

use crate::common::{generate_headers, rules, unit};
use ricegen::config::InstantiationRequest;
use ricegen::diagnostics::DiagnosticKind;

const BOX: &str = r#"
namespace Tests {

template<typename T>
class Box {
public:
    Box(T value);
    T get() const;
    void set(const T& value);
};

typedef Box<double> BoxDouble;

template<typename... Ts>
class Tuple {
public:
    int size() const;
};

} // namespace Tests
"#;

#[test]
fn test_typedef_instantiates_template() {
    let generation = generate_headers(&rules(), &[("box.hpp", BOX)]);
    let generated = generation.units.iter().find(|u| u.stem == "box").unwrap();
    let ipp = generated.ipp.as_deref().expect("builders are written to box-rb.ipp");

    assert!(ipp.contains("template<typename Data_Type_T, typename T>\ninline void Box_builder(Data_Type_T& klass)\n{\n  klass."));
    assert!(ipp.contains("define_method(\"get\", &Tests::Box<T>::get)"));
    assert!(ipp.contains("define_method(\"set\", &Tests::Box<T>::set,"));
    assert!(!ipp.contains("Tuple"));

    let cpp = unit(&generation, "box");
    assert!(cpp.contains("#include \"box-rb.ipp\""));
    assert!(cpp.contains("\"BoxDouble\")"));
    assert!(cpp.contains("define(&Box_builder<Data_Type<"));
    assert!(!cpp.contains("\"Tuple\""));
    assert_eq!(generation.stats.instantiations, 1);
}

#[test]
fn test_requested_instantiation() {
    let mut rules = rules();
    rules.instantiate = vec![
        InstantiationRequest {
            template: "Tests::Box".to_string(),
            args: vec!["int".to_string()],
            name: Some("IntBox".to_string()),
        },
        InstantiationRequest {
            template: "Tests::Missing".to_string(),
            args: vec!["int".to_string()],
            name: None,
        },
    ];
    let generation = generate_headers(&rules, &[("box.hpp", BOX)]);
    let cpp = unit(&generation, "box");

    assert!(cpp.contains("\"IntBox\")"));
    assert!(cpp.contains("\"BoxDouble\")"));
    assert_eq!(generation.stats.instantiations, 2);
    assert!(
        generation
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnknownTemplate && d.name == "Tests::Missing")
    );
    // An unknown template is a warning, not an emission error.
    assert!(!generation.has_errors());
}

#[test]
fn test_builders_are_shared_across_units() {
    let user = r#"
namespace Tests {
typedef Box<float> BoxFloat;
}
"#;
    let generation = generate_headers(&rules(), &[("box.hpp", BOX), ("user.hpp", user)]);
    let user_unit = generation.units.iter().find(|u| u.stem == "user").unwrap();

    // The builder lives with its template.
    assert!(user_unit.ipp.is_none());
    assert!(user_unit.cpp.contains("#include \"box-rb.ipp\""));
    assert!(user_unit.cpp.contains("\"BoxFloat\")"));
    assert!(user_unit.cpp.contains("define(&Box_builder<Data_Type<"));
}

#[test]
fn test_specialization_arguments_are_qualified() {
    let header = r#"
namespace Tests {

template<typename T>
struct TypeTraits {
    static const int type = 0;
};

class lowercase_type {
public:
    int value;
};

template<>
struct TypeTraits<lowercase_type> {
    static const int type = 4;
};

} // namespace Tests
"#;
    let generation = generate_headers(&rules(), &[("traits.hpp", header)]);
    let cpp = unit(&generation, "traits");

    assert!(cpp.contains("define_class_under<Tests::TypeTraits<Tests::lowercase_type>>(rb_mTests, \"TypeTraitsLowercaseType\")"));
    assert!(cpp.contains("define_constant(\"Type\", Tests::TypeTraits<Tests::lowercase_type>::type)"));
    assert!(!cpp.contains("TypeTraits<lowercase_type>"));
}

#[test]
fn test_template_typedef_in_default_argument() {
    let header = r#"
namespace cv {

template<typename T, int n>
class Vec {
public:
    static Vec all(T alpha);
};

template<typename T>
class Affine3 {
public:
    typedef Vec<T, 3> Vec3Type;
    void scale(const Vec3Type& s = Vec3Type::all(1));
};

typedef Affine3<float> Affine3f;

} // namespace cv
"#;
    let generation = generate_headers(&rules(), &[("affine.hpp", header)]);
    let generated = generation.units.iter().find(|u| u.stem == "affine").unwrap();
    let ipp = generated.ipp.as_deref().expect("builders are written to affine-rb.ipp");

    assert!(ipp.contains(
        "Arg(\"s\") = static_cast<const typename cv::Affine3<T>::Vec3Type&>(cv::Affine3<T>::Vec3Type::all(1))"
    ));
    assert!(!ipp.contains("cv::Vec::all"));
    assert!(!ipp.contains("cv::Vec3::"));
    assert!(unit(&generation, "affine").contains("\"Affine3f\")"));
}

#[test]
fn test_typedef_omitting_defaults_names_instantiation() {
    let header = r#"
namespace Tests {

template<typename T, int R, int C = 1>
class Matrix {
public:
    T at(int r, int c) const;
};

typedef Matrix<int, 2> Matrix2i;
typedef Matrix<double, 3, 1> Matrix3d;

} // namespace Tests
"#;
    let generation = generate_headers(&rules(), &[("matrix.hpp", header)]);
    let cpp = unit(&generation, "matrix");

    // Both typedefs spell the same instantiation once defaults are filled.
    assert!(cpp.contains("\"Matrix2i\")"));
    assert!(cpp.contains("\"Matrix3d\")"));
    assert!(!cpp.contains("MatrixInt21"));
    assert!(!cpp.contains("MatrixDouble31"));
    assert_eq!(generation.stats.instantiations, 2);
}

#[test]
fn test_dependent_member_types() {
    let header = r#"
namespace Tests {

template<typename T>
class DataType {
public:
    typedef T channel_type;
};

template<typename _Tp>
class Point_ {
public:
    Point_();
    _Tp x;
};

template<typename _Tp>
class Mat_ {
public:
    Mat_(const Point_<typename DataType<_Tp>::channel_type>& origin);
};

typedef Point_<float> Point2f;
typedef Mat_<float> Mat1f;

} // namespace Tests
"#;
    let generation = generate_headers(&rules(), &[("mat.hpp", header)]);
    let generated = generation.units.iter().find(|u| u.stem == "mat").unwrap();
    let ipp = generated.ipp.as_deref().expect("builders are written to mat-rb.ipp");

    assert!(ipp.contains(
        "Constructor<Tests::Mat_<_Tp>, const Tests::Point_<typename Tests::DataType<_Tp>::channel_type>&>()"
    ));

    // Point_<DataType<float>::channel_type> is Point_<float>.
    let cpp = unit(&generation, "mat");
    assert!(cpp.contains("\"Point2f\")"));
    assert!(cpp.contains("\"Mat1f\")"));
    assert_eq!(cpp.matches("define(&Point__builder<").count(), 1);
    assert!(!cpp.contains("channel_type>>"));
}
