//! Emission from declaration trees, without a header parser in the way.

use ricegen::ast::Access;
use ricegen::{ExitCode, FilterVerdict, Generation, Generator, RawDecl, RawHeader, RawKind, Settings};

fn header(path: &str, decls: Vec<RawDecl>) -> RawHeader {
    RawHeader {
        path: path.into(),
        decls,
    }
}

fn generate(settings: &Settings, headers: Vec<RawHeader>) -> Generation {
    let rules = settings.compile_rules().unwrap();
    Generator::new(&rules).generate(headers)
}

fn pure_virtual(mut decl: RawDecl) -> RawDecl {
    decl.is_pure_virtual = true;
    decl
}

fn verdict_of(generation: &Generation, name: &str) -> Option<FilterVerdict> {
    generation
        .report
        .excluded
        .iter()
        .find(|e| e.name == name)
        .map(|e| e.verdict)
}

#[test]
fn test_field_access_modes() {
    let decls = vec![
        RawDecl::new(RawKind::Class, "Locked").with_children(vec![
            RawDecl::new(RawKind::Method, "operator=")
                .with_param("other", "const Locked&")
                .with_return("Locked&")
                .deleted(),
        ]),
        RawDecl::new(RawKind::Struct, "Holder").with_children(vec![
            RawDecl::new(RawKind::Field, "count").with_type("int"),
            RawDecl::new(RawKind::Field, "id").with_type("const int"),
            RawDecl::new(RawKind::Field, "values").with_type("int[4]"),
            RawDecl::new(RawKind::Field, "name").with_type("const char*"),
            RawDecl::new(RawKind::Field, "lock").with_type("Locked"),
            RawDecl::new(RawKind::Field, "MAX").with_type("const int").statik(),
            RawDecl::new(RawKind::Field, "instances").with_type("int").statik(),
        ]),
    ];
    let generation = generate(&Settings::default(), vec![header("holder.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(cpp.contains("define_attr(\"count\", &Holder::count)"));
    assert!(!cpp.contains("&Holder::count, Rice::AttrAccess::Read"));
    assert!(cpp.contains("define_attr(\"id\", &Holder::id, Rice::AttrAccess::Read)"));
    assert!(cpp.contains("define_attr(\"values\", &Holder::values, Rice::AttrAccess::Read)"));
    // The pointee is const, the pointer itself is not.
    assert!(!cpp.contains("&Holder::name, Rice::AttrAccess::Read"));
    assert!(cpp.contains("define_attr(\"lock\", &Holder::lock, Rice::AttrAccess::Read)"));
    assert!(cpp.contains("define_constant(\"MAX\", Holder::MAX)"));
    assert!(cpp.contains("define_singleton_attr(\"Instances\", &Holder::instances)"));
    assert!(!cpp.contains("\"assign\""));
}

#[test]
fn test_constructors() {
    let decls = vec![
        RawDecl::new(RawKind::Class, "Plain").with_children(vec![
            RawDecl::new(RawKind::Method, "size").with_return("int").constant(),
        ]),
        RawDecl::new(RawKind::Class, "Shape").with_children(vec![pure_virtual(
            RawDecl::new(RawKind::Method, "draw").constant(),
        )]),
        RawDecl::new(RawKind::Class, "Matrix").with_children(vec![
            RawDecl::new(RawKind::Constructor, "Matrix"),
            RawDecl::new(RawKind::Constructor, "Matrix")
                .with_param("rows", "int")
                .with_default_param("cols", "int", "10"),
            RawDecl::new(RawKind::Constructor, "Matrix").with_param("other", "Matrix&&"),
            RawDecl::new(RawKind::Constructor, "Matrix")
                .with_param("secret", "double")
                .with_access(Access::Private),
        ]),
    ];
    let generation = generate(&Settings::default(), vec![header("ctors.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(cpp.contains("define_constructor(Constructor<Plain>())"));
    assert!(!cpp.contains("Constructor<Shape"));
    assert!(cpp.contains("define_method(\"draw\", &Shape::draw)"));
    assert!(cpp.contains("define_constructor(Constructor<Matrix>())"));
    assert!(cpp.contains(
        "define_constructor(Constructor<Matrix, int, int>(),\n      Arg(\"rows\"), Arg(\"cols\") = static_cast<int>(10))"
    ));
    assert!(!cpp.contains("Matrix&&"));
    assert!(!cpp.contains("Constructor<Matrix, double>"));
}

#[test]
fn test_methods_and_signatures() {
    let decls = vec![RawDecl::new(RawKind::Namespace, "Outer").with_children(vec![
        RawDecl::new(RawKind::Class, "Image").with_children(vec![
            RawDecl::new(RawKind::Method, "isEmpty").with_return("bool").constant(),
            RawDecl::new(RawKind::Method, "contains")
                .with_param("x", "int")
                .with_return("bool"),
            RawDecl::new(RawKind::Method, "scale").with_param("factor", "double"),
            RawDecl::new(RawKind::Method, "scale")
                .with_param("x", "double")
                .with_param("y", "double"),
            RawDecl::new(RawKind::Method, "create")
                .with_return("int")
                .statik(),
            RawDecl::new(RawKind::Method, "update_"),
            RawDecl::new(RawKind::Method, "pixels").with_return("unsigned char*"),
        ]),
        RawDecl::new(RawKind::Function, "loadImage")
            .with_param("fileName", "const char*")
            .with_return("int"),
    ])];
    let generation = generate(&Settings::default(), vec![header("image.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(cpp.contains("rb_mOuter = define_module(\"Outer\");"));
    assert!(cpp.contains("rb_cOuterImage = define_class_under<Outer::Image>(rb_mOuter, \"Image\")"));
    assert!(cpp.contains("define_method(\"empty?\", &Outer::Image::isEmpty)"));
    assert!(cpp.contains("define_method(\"contains\", &Outer::Image::contains,"));
    assert!(cpp.contains(
        "define_method<void(Outer::Image::*)(double)>(\"scale\", &Outer::Image::scale,\n      Arg(\"factor\"))"
    ));
    assert!(cpp.contains("define_method<void(Outer::Image::*)(double, double)>(\"scale\""));
    assert!(cpp.contains("define_singleton_function(\"create\", &Outer::Image::create)"));
    assert!(!cpp.contains("update_"));
    assert!(cpp.contains("define_method(\"pixels\", &Outer::Image::pixels,\n      ReturnBuffer())"));
    assert!(cpp.contains(
        "rb_mOuter.define_module_function(\"load_image\", &Outer::loadImage,\n    Arg(\"file_name\"))"
    ));
    assert!(cpp.contains("static Rice::Module rb_mOuter;"));
    assert!(cpp.contains("static Rice::Data_Type<Outer::Image> rb_cOuterImage;"));
}

#[test]
fn test_enums_and_constants() {
    let decls = vec![
        RawDecl::new(RawKind::Enum, "Mode").with_children(vec![
            RawDecl::new(RawKind::EnumConstant, "Fast"),
            RawDecl::new(RawKind::EnumConstant, "Exact"),
        ]),
        RawDecl::new(RawKind::Enum, "").with_children(vec![
            RawDecl::new(RawKind::EnumConstant, "Small").with_value("1"),
            RawDecl::new(RawKind::EnumConstant, "Large").with_value("2"),
        ]),
        RawDecl::new(RawKind::Variable, "kLimit").with_type("const int").with_value("100"),
        RawDecl::new(RawKind::Macro, "API_VERSION").with_value("3"),
    ];
    let generation = generate(&Settings::default(), vec![header("modes.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(cpp.contains(
        "rb_cMode = define_enum<Mode>(\"Mode\").\n    define_value(\"Fast\", Mode::Fast).\n    define_value(\"Exact\", Mode::Exact);"
    ));
    assert!(cpp.contains("Class(rb_cObject).define_constant(\"Small\", (int)"));
    assert!(cpp.contains("Class(rb_cObject).define_constant(\"Large\", (int)"));
    assert!(cpp.contains("Class(rb_cObject).define_constant(\"KLimit\", kLimit);"));
    assert!(cpp.contains("Class(rb_cObject).define_constant(\"API_VERSION\", API_VERSION);"));
}

#[test]
fn test_ambiguous_overloads_fail_the_run() {
    let decls = vec![
        RawDecl::new(RawKind::Typedef, "Int").with_type("int"),
        RawDecl::new(RawKind::Function, "convert").with_param("a", "int"),
        RawDecl::new(RawKind::Function, "convert").with_param("a", "const Int"),
        RawDecl::new(RawKind::Function, "convert").with_param("a", "double"),
    ];
    let generation = generate(&Settings::default(), vec![header("convert.hpp", decls)]);

    assert!(generation.has_errors());
    assert_eq!(ExitCode::from_run(generation.has_errors()), ExitCode::EmissionErrors);
    let cpp = &generation.units[0].cpp;
    assert!(cpp.contains("define_global_function<void(*)(double)>(\"convert\""));
    assert!(!cpp.contains("void(*)(int)"));
    let structural = generation
        .report
        .excluded
        .iter()
        .filter(|e| e.verdict == FilterVerdict::ExcludeStructural)
        .count();
    assert_eq!(structural, 2);
}

#[test]
fn test_skip_rules_propagate() {
    let mut settings = Settings::default();
    settings.rules.skip_symbols = vec!["Outer::Hidden".to_string()];
    settings.rules.skip_functions = vec!["/^debug/".to_string()];
    let decls = vec![RawDecl::new(RawKind::Namespace, "Outer").with_children(vec![
        RawDecl::new(RawKind::Class, "Hidden"),
        RawDecl::new(RawKind::Class, "Visible")
            .with_base("Hidden")
            .with_children(vec![
                RawDecl::new(RawKind::Method, "hidden").with_return("Hidden"),
                RawDecl::new(RawKind::Method, "show"),
            ]),
        RawDecl::new(RawKind::Function, "useHidden").with_param("h", "Hidden"),
        RawDecl::new(RawKind::Function, "debugDump"),
        RawDecl::new(RawKind::Function, "run"),
    ])];
    let generation = generate(&settings, vec![header("outer.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(!cpp.contains("\"Hidden\""));
    // The excluded base is dropped, the class stays.
    assert!(cpp.contains("define_class_under<Outer::Visible>(rb_mOuter, \"Visible\")"));
    assert!(!cpp.contains("&Outer::Visible::hidden"));
    assert!(!cpp.contains("use_hidden"));
    assert!(!cpp.contains("debug_dump"));
    assert!(cpp.contains("define_module_function(\"run\", &Outer::run)"));

    assert_eq!(verdict_of(&generation, "Outer::Hidden"), Some(FilterVerdict::ExcludeSkipRule));
    assert_eq!(
        verdict_of(&generation, "Outer::useHidden"),
        Some(FilterVerdict::ExcludeTransitiveSkip)
    );
    assert_eq!(verdict_of(&generation, "Outer::debugDump"), Some(FilterVerdict::ExcludeSkipRule));
}

#[test]
fn test_export_and_deprecation_macros() {
    let mut settings = Settings::default();
    settings.rules.export_macros = vec!["MY_EXPORT".to_string()];
    settings.rules.deprecation_macros = vec!["MY_DEPRECATED".to_string()];
    let decls = vec![
        RawDecl::new(RawKind::Function, "exported").with_attribute("MY_EXPORT"),
        RawDecl::new(RawKind::Function, "internal"),
        RawDecl::new(RawKind::Function, "retired")
            .with_attribute("MY_EXPORT")
            .with_attribute("MY_DEPRECATED(\"gone\")"),
        RawDecl::new(RawKind::Function, "old")
            .with_attribute("MY_EXPORT")
            .with_attribute("[[deprecated]]"),
    ];
    let generation = generate(&settings, vec![header("api.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(cpp.contains("define_global_function(\"exported\", &exported)"));
    assert!(!cpp.contains("\"internal\""));
    assert!(!cpp.contains("\"retired\""));
    assert!(!cpp.contains("\"old\""));
    assert_eq!(verdict_of(&generation, "internal"), Some(FilterVerdict::ExcludeUnexported));
    assert_eq!(verdict_of(&generation, "retired"), Some(FilterVerdict::ExcludeDeprecated));
    assert_eq!(verdict_of(&generation, "old"), Some(FilterVerdict::ExcludeDeprecated));
}

#[test]
fn test_base_classes_across_units() {
    let headers = vec![
        header(
            "base.hpp",
            vec![RawDecl::new(RawKind::Class, "Base").with_children(vec![
                RawDecl::new(RawKind::Method, "id").with_return("int"),
            ])],
        ),
        header(
            "derived.hpp",
            vec![RawDecl::new(RawKind::Class, "Derived").with_base("Base")],
        ),
    ];
    let generation = generate(&Settings::default(), headers);

    assert_eq!(generation.units.len(), 2);
    let derived = &generation.units[1].cpp;
    assert!(derived.contains("rb_cDerived = define_class<Derived, Base>(\"Derived\")"));
    assert!(!derived.contains("define_class<Base>"));
    assert!(generation.units[0].cpp.contains("define_class<Base>(\"Base\")"));
    assert!(derived.starts_with("#include <derived.hpp>\n#include \"derived-rb.hpp\"\n"));
    assert!(generation.units[1].hpp.contains("void Init_Derived();"));
}

#[test]
fn test_free_operators_become_methods() {
    let decls = vec![
        RawDecl::new(RawKind::Class, "Vec").with_children(vec![
            RawDecl::new(RawKind::Field, "x").with_type("double"),
        ]),
        RawDecl::new(RawKind::Function, "operator+")
            .with_param("a", "const Vec&")
            .with_param("b", "const Vec&")
            .with_return("Vec"),
        RawDecl::new(RawKind::Function, "operator<<")
            .with_param("os", "std::ostream&")
            .with_param("v", "const Vec&")
            .with_return("std::ostream&"),
    ];
    let generation = generate(&Settings::default(), vec![header("vec.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(cpp.contains("#include <sstream>"));
    assert!(cpp.contains("  rb_cVec."));
    assert!(cpp.contains("define_method(\"+\", [](const Vec& self, const Vec& other) -> Vec"));
    assert!(cpp.contains("return self + other;"));
    assert!(cpp.contains("define_method(\"inspect\", [](const Vec& self) -> std::string"));
    assert!(cpp.contains("stream << self;"));
    assert!(!cpp.contains("define_global_function(\"+\""));
}

#[test]
fn test_incomplete_types_are_excluded() {
    let decls = vec![
        RawDecl::new(RawKind::Struct, "Handle").forward(),
        RawDecl::new(RawKind::Function, "release").with_param("handle", "Handle*"),
        RawDecl::new(RawKind::Function, "size").with_param("value", "std::string&"),
    ];
    let generation = generate(&Settings::default(), vec![header("handles.hpp", decls)]);
    let cpp = &generation.units[0].cpp;

    assert!(!cpp.contains("\"release\""));
    assert!(!cpp.contains("define_class"));
    assert!(cpp.contains("define_global_function(\"size\", &size,"));
    let entry = generation
        .report
        .excluded
        .iter()
        .find(|e| e.name == "release")
        .unwrap();
    assert_eq!(entry.verdict, FilterVerdict::ExcludeIncompleteType);
    assert!(entry.reason.as_deref().unwrap_or_default().contains("Handle"));
}
