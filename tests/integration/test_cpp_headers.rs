//! Headers parsed with tree-sitter, through to generated units.

use crate::common::{generate_headers, rules, sample_headers, unit};
use ricegen::FilterVerdict;

#[test]
fn test_shapes_header() {
    let generation = generate_headers(&rules(), &[("shapes.hpp", sample_headers::SHAPES)]);
    let cpp = unit(&generation, "shapes");

    assert!(cpp.starts_with("#include <shapes.hpp>\n#include \"shapes-rb.hpp\"\n"));
    assert!(cpp.contains("void Init_Shapes()"));
    assert!(cpp.contains("static Rice::Module rb_mShapes;"));
    assert!(cpp.contains("static Rice::Data_Type<Shapes::Circle> rb_cShapesCircle;"));
    assert!(cpp.contains("static Rice::Enum<Shapes::Color> rb_cShapesColor;"));

    let module = cpp.find("rb_mShapes = define_module(\"Shapes\");").unwrap();
    let class = cpp
        .find("rb_cShapesCircle = define_class_under<Shapes::Circle>(rb_mShapes, \"Circle\")")
        .unwrap();
    assert!(module < class);

    assert!(cpp.contains("define_enum_under<Shapes::Color>(\"Color\", rb_mShapes)"));
    assert!(cpp.contains("define_value(\"Red\", Shapes::Color::Red)"));
    assert!(cpp.contains("define_constructor(Constructor<Shapes::Circle, double>(),\n      Arg(\"radius\"))"));
    assert!(cpp.contains("define_method(\"area\", &Shapes::Circle::area)"));
    assert!(cpp.contains("define_method(\"empty?\", &Shapes::Circle::isEmpty)"));
    assert!(cpp.contains("define_method<void(Shapes::Circle::*)(double)>(\"scale\""));
    assert!(cpp.contains("define_method<void(Shapes::Circle::*)(double, double)>(\"scale\""));
    assert!(cpp.contains("define_attr(\"id\", &Shapes::Circle::id, Rice::AttrAccess::Read)"));
    assert!(cpp.contains("define_attr(\"color\", &Shapes::Circle::color)"));
    assert!(!cpp.contains("radius_"));
    assert!(cpp.contains("rb_mShapes.define_module_function(\"distance\", &Shapes::distance,"));
    assert!(cpp.contains("Class(rb_cObject).define_constant(\"SHAPES_VERSION\", SHAPES_VERSION);"));
    assert!(!generation.has_errors());
}

#[test]
fn test_buffers_and_exclusions() {
    let generation = generate_headers(&rules(), &[("buffers.h", sample_headers::BUFFERS)]);
    let cpp = unit(&generation, "buffers");

    assert!(cpp.contains("define_class<Widget>(\"Widget\")"));
    assert!(cpp.contains("define_global_function(\"measure\", &measure,\n    Arg(\"widget\"))"));
    assert!(cpp.contains("define_global_function(\"fill\", &fill,\n    ArgBuffer(\"values\"), Arg(\"count\"))"));
    assert!(cpp.contains("define_global_function(\"data\", &data,\n    ReturnBuffer())"));
    assert!(cpp.contains("Arg(\"rows\"), Arg(\"cols\") = static_cast<int>(10)"));
    assert!(!cpp.contains("\"release\""));
    assert!(!cpp.contains("old_measure"));
    assert!(!cpp.contains("\"log\""));

    let verdict = |name: &str| {
        generation
            .report
            .excluded
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.verdict)
    };
    assert_eq!(verdict("release"), Some(FilterVerdict::ExcludeIncompleteType));
    assert_eq!(verdict("oldMeasure"), Some(FilterVerdict::ExcludeDeprecated));
    assert_eq!(verdict("log"), Some(FilterVerdict::ExcludeVariadic));

    let entry = generation
        .report
        .excluded
        .iter()
        .find(|e| e.name == "oldMeasure")
        .unwrap();
    assert!(entry.header.as_deref().unwrap().ends_with("buffers.h"));
    assert_eq!(entry.line, Some(11));
}

#[test]
fn test_callbacks_through_typedefs() {
    let header = r#"
typedef bool (*ProcessCallback)(int* data, int size, void* userData);

class Processor {
public:
    void setCallback(ProcessCallback callback, void* userData);
    void process(float* samples, int count);
};
"#;
    let generation = generate_headers(&rules(), &[("processor.hpp", header)]);
    let cpp = unit(&generation, "processor");

    assert!(cpp.contains(
        "define_method(\"set_callback\", &Processor::setCallback,\n      Arg(\"callback\"), ArgBuffer(\"user_data\"))"
    ));
    assert!(cpp.contains(
        "define_method(\"process\", &Processor::process,\n      ArgBuffer(\"samples\"), Arg(\"count\"))"
    ));
}

#[test]
fn test_units_follow_header_order() {
    let base = r#"
namespace Geo {
class Base {
public:
    int id() const;
};
}
"#;
    let derived = r#"
namespace Geo {
class Square : public Base {
public:
    explicit Square(double side);
};
}
"#;
    let generation = generate_headers(&rules(), &[("base.hpp", base), ("square.hpp", derived)]);

    let stems: Vec<&str> = generation.units.iter().map(|u| u.stem.as_str()).collect();
    assert_eq!(stems, vec!["base", "square"]);
    let square = unit(&generation, "square");
    // Namespaces merge across headers; each unit defines the modules it needs.
    assert!(square.contains("rb_mGeo = define_module(\"Geo\");"));
    assert!(square.contains("define_class_under<Geo::Square, Geo::Base>(rb_mGeo, \"Square\")"));
    assert!(!square.contains("define_class_under<Geo::Base>"));
}

#[test]
fn test_annotation_macros() {
    let header = r#"
#define MY_EXPORT
#define MY_DEPRECATED(msg)

MY_EXPORT int visible(int value);
int hidden(int value);
MY_EXPORT MY_DEPRECATED("use visible") int retired(int value);
"#;
    let mut settings = ricegen::Settings::default();
    settings.rules.export_macros = vec!["MY_EXPORT".to_string()];
    settings.rules.deprecation_macros = vec!["MY_DEPRECATED".to_string()];
    let rules = settings.compile_rules().unwrap();

    let project = crate::common::TestProject::new();
    let path = project.add_file("api.hpp", header);
    let factory = ricegen::ProviderFactory::from_settings(&settings);
    let generation = ricegen::Generator::new(&rules).run(&factory, &[path]).unwrap();
    let cpp = unit(&generation, "api");

    assert!(cpp.contains("define_global_function(\"visible\", &visible,"));
    assert!(!cpp.contains("\"hidden\""));
    assert!(!cpp.contains("\"retired\""));
}

#[test]
fn test_class_name_inside_its_own_scope() {
    let header = r#"
namespace N {
class Ctx {
public:
    Ctx(const Ctx& other);
    Ctx clone() const;
    Ctx clone(int depth) const;
    static Ctx* create(int size = Ctx::DEFAULT_SIZE);
    static const int DEFAULT_SIZE = 4;
};
}
"#;
    let generation = generate_headers(&rules(), &[("ctx.hpp", header)]);
    let cpp = unit(&generation, "ctx");

    assert!(cpp.contains("Constructor<N::Ctx, const N::Ctx&>()"));
    assert!(cpp.contains("define_method<N::Ctx(N::Ctx::*)() const>(\"clone\""));
    assert!(cpp.contains("define_method<N::Ctx(N::Ctx::*)(int) const>(\"clone\""));
    assert!(cpp.contains("Arg(\"size\") = static_cast<int>(N::Ctx::DEFAULT_SIZE)"));
    assert!(!cpp.contains("Ctx::Ctx"));
}

#[test]
fn test_variadic_overload_keeps_its_sibling() {
    let header = r#"
void print_formatted(const char* text);
void print_formatted(const char* format, ...);
"#;
    let generation = generate_headers(&rules(), &[("print.hpp", header)]);
    let cpp = unit(&generation, "print");

    // The excluded variadic form still makes this an overload set.
    assert!(cpp.contains(
        "define_global_function<void(*)(const char*)>(\"print_formatted\", &print_formatted,\n    Arg(\"text\"))"
    ));
    assert_eq!(cpp.matches("\"print_formatted\"").count(), 1);
    assert!(
        generation
            .report
            .excluded
            .iter()
            .any(|e| e.name == "print_formatted" && e.verdict == FilterVerdict::ExcludeVariadic)
    );
    assert!(!generation.has_errors());
}

#[test]
fn test_annotated_class_is_a_class() {
    let header = r#"
#define EXPORT_ME

namespace Outer {
class EXPORT_ME Foo {
public:
    int x;
};
}
"#;
    let generation = generate_headers(&rules(), &[("export.hpp", header)]);
    let cpp = unit(&generation, "export");

    assert!(cpp.contains("define_class_under<Outer::Foo>(rb_mOuter, \"Foo\")"));
    assert!(cpp.contains("define_attr(\"x\", &Outer::Foo::x)"));
    assert!(!cpp.contains("define_constant(\"Foo\""));
}

#[test]
fn test_output_independent_of_header_order() {
    let user = r#"
namespace Tests {
typedef Box<float> BoxFloat;
}
"#;
    let boxes = r#"
namespace Tests {
template<typename T>
class Box {
public:
    T get() const;
};
}
"#;
    let headers = [
        ("shapes.hpp", sample_headers::SHAPES),
        ("buffers.h", sample_headers::BUFFERS),
        ("box.hpp", boxes),
        ("user.hpp", user),
    ];
    let mut reversed = headers;
    reversed.reverse();

    let forward = generate_headers(&rules(), &headers);
    let backward = generate_headers(&rules(), &reversed);

    assert_eq!(forward.units.len(), backward.units.len());
    for generated in &forward.units {
        let other = backward
            .units
            .iter()
            .find(|u| u.stem == generated.stem)
            .unwrap_or_else(|| panic!("no unit for {}", generated.stem));
        assert_eq!(generated.cpp, other.cpp, "{}.cpp", generated.stem);
        assert_eq!(generated.hpp, other.hpp, "{}.hpp", generated.stem);
        assert_eq!(generated.ipp, other.ipp, "{}.ipp", generated.stem);
    }
}
