#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use cybro::error::{EXIT_RUNTIME, EXIT_STATIC};
    use cybro::{RunError, RunReport, Runner};
    use pretty_assertions::assert_eq;

    /// Program output sink the test can read back after the run.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.borrow())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn runner() -> (Runner, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Runner::with_output(Box::new(buffer.clone())), buffer)
    }

    fn run(source: &str) -> (Vec<String>, Result<RunReport, RunError>) {
        let (mut runner, buffer) = runner();
        let result = runner.run(source);
        (buffer.lines(), result)
    }

    fn output(source: &str) -> Vec<String> {
        let (lines, result) = run(source);
        if let Err(e) = result {
            panic!("program failed: {}\noutput so far: {:?}", e, lines);
        }
        lines
    }

    fn runtime_error(source: &str) -> String {
        match run(source).1 {
            Err(e @ RunError::Runtime(_)) => {
                assert_eq!(e.exit_code(), EXIT_RUNTIME);
                e.diagnostics()[0].message()
            }
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpreter_01_arithmetic_and_concatenation() {
        assert_eq!(
            output(
                "print 1 + 2; print \"a\" + 1; print 7 / 2; print 3 ~ 5; print 3 ~~ 5; \
                 print 1 / 0; print -(2 * 3);"
            ),
            vec!["3", "a1", "3.5", "3", "5", "inf", "-6"]
        );
    }

    #[test]
    fn test_interpreter_02_truthiness_and_logic() {
        assert_eq!(
            output(
                "if (\"false\") print \"yes\"; else print \"no\";
                 if (0) print \"yes\"; else print \"no\";
                 print nil or \"default\";
                 print 1 and 2;
                 print !nyl;"
            ),
            vec!["no", "no", "default", "2", "true"]
        );
    }

    #[test]
    fn test_interpreter_03_strict_equality() {
        assert_eq!(
            output("print 1 == \"1\"; print nil == false; print \"a\" == \"a\"; print 2 != 2;"),
            vec!["false", "false", "true", "false"]
        );
    }

    #[test]
    fn test_interpreter_04_counter_closures() {
        let source = "
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    return i;
                }
                return count;
            }

            var c = makeCounter();
            println(c());
            println(c());

            var d = makeCounter();
            println(d());
        ";

        assert_eq!(output(source), vec!["1", "2", "1"]);
    }

    #[test]
    fn test_interpreter_05_shadowed_initializer_reads_outer_binding() {
        let (lines, result) = run("var a = 1; { var a = a + 1; println(a); } println(a);");

        assert_eq!(lines, vec!["2", "1"]);
        assert_eq!(result.unwrap().warnings.len(), 1);
    }

    #[test]
    fn test_interpreter_06_closures_bind_statically() {
        let source = "
            var a = \"global\";
            {
                fun show() { println(a); }
                show();
                var a = \"block\";
                show();
            }
        ";

        assert_eq!(output(source), vec!["global", "global"]);
    }

    #[test]
    fn test_interpreter_07_let_is_single_assignment() {
        assert_eq!(output("var v = 1; v = 2; print v;"), vec!["2"]);

        let message: String = runtime_error("let k = 1; k = 2;");
        assert_eq!(message, "Cannot assign to constant 'k'");

        let message: String = runtime_error("fun f() { let k = 1; k = 2; } f();");
        assert_eq!(message, "Cannot assign to constant 'k'");
    }

    #[test]
    fn test_interpreter_08_inheritance_and_super() {
        let source = "
            class A {
                method() { return \"A method\"; }
                greet() { return \"hi from A\"; }
                name() { return this.n; }
            }

            class B < A {
                init(n) { this.n = n; }
                method() { return \"B method\"; }
                test() { return super.method(); }
                name() { return \"B:\" + super.name(); }
            }

            var b = B(\"x\");
            print b.method();
            print b.test();
            print b.greet();
            print b.name();
        ";

        assert_eq!(
            output(source),
            vec!["B method", "A method", "hi from A", "B:x"]
        );
    }

    #[test]
    fn test_interpreter_09_initializer_returns_instance() {
        let source = "
            class P {
                init(x) {
                    this.x = x;
                    return;
                }
            }

            var p = P(3);
            print p.x;
            print p.init(4) == p;
            print p.x;
            print p;
            print P;
        ";

        assert_eq!(output(source), vec!["3", "true", "4", "P instance", "P"]);
    }

    #[test]
    fn test_interpreter_10_bound_methods_keep_their_receiver() {
        let source = "
            class C {
                init() { this.v = 7; }
                get() { return this.v; }
            }

            var m = C().get;
            print m();

            class Box {}
            var b = Box();
            b.v = 5;
            print b.v;
        ";

        assert_eq!(output(source), vec!["7", "5"]);
    }

    #[test]
    fn test_interpreter_11_break_and_return_exit_nearest_construct() {
        let source = "
            var i = 0;
            while (true) {
                i = i + 1;
                if (i == 3) break;
            }
            print i;

            for (var j = 0; j < 10; j = j + 1) {
                for (var k = 0; k < 10; k = k + 1) {
                    if (k == 1) break;
                    print j * 10 + k;
                }
                if (j == 1) break;
            }

            fun find() {
                for (var n = 0; n < 10; n = n + 1) {
                    while (true) {
                        if (n == 2) return n;
                        break;
                    }
                }
                return -1;
            }
            print find();
        ";

        assert_eq!(output(source), vec!["3", "0", "10", "2"]);
    }

    #[test]
    fn test_interpreter_12_callable_display() {
        assert_eq!(
            output("fun f(a, b) {} println(f); println(clock); println(println); print f(1, 2);"),
            vec!["<fn f/2>", "<native fn clock>", "<native fn println>", "nil"]
        );

        assert_eq!(output("print clock() > 0;"), vec!["true"]);
    }

    #[test]
    fn test_interpreter_13_runtime_errors() {
        assert!(runtime_error("print -\"a\";").contains("must be a number"));
        assert!(runtime_error("print 1 < \"a\";").starts_with("Operands must be numbers"));
        assert_eq!(runtime_error("print missing;"), "Undefined variable 'missing'");
        assert!(runtime_error("\"x\"();").starts_with("Can only call functions and classes"));
        assert_eq!(runtime_error("fun f(a) {} f();"), "Expected 1 arguments but got 0");
        assert!(runtime_error("var x = 1; print x.y;").starts_with("Only instances have properties"));
        assert_eq!(runtime_error("var x = 1; x.y = 2;"), "Only instances have fields");
        assert_eq!(
            runtime_error("class Box {} print Box().missing;"),
            "Undefined property 'missing'"
        );
        assert_eq!(
            runtime_error("var NotClass = 1; class C < NotClass {}"),
            "Superclass must be a class"
        );
        assert!(runtime_error("var a = 1; var a = 2;").contains("already declared"));
    }

    #[test]
    fn test_interpreter_14_runtime_error_keeps_earlier_output() {
        let (lines, result) = run("print 1;\nprint nope;\nprint 3;");

        assert_eq!(lines, vec!["1"]);

        let err: RunError = result.unwrap_err();
        assert_eq!(err.exit_code(), EXIT_RUNTIME);
        assert_eq!(
            err.to_string(),
            "[line 2] at 'nope': error: Undefined variable 'nope'"
        );
    }

    #[test]
    fn test_interpreter_15_static_errors_prevent_execution() {
        for source in ["print 1; print ;", "print 1; return 2;", "print 1; $", "print 1; break;"] {
            let (lines, result) = run(source);

            assert!(lines.is_empty(), "{:?} produced output {:?}", source, lines);

            let err: RunError = result.unwrap_err();
            assert_eq!(err.exit_code(), EXIT_STATIC, "{:?}", source);
            assert!(matches!(err, RunError::Static(_)));
        }
    }

    #[test]
    fn test_interpreter_16_static_errors_are_all_reported() {
        let err: RunError = run("var = 1;\nprint 1 @;\nvar ok = ;").1.unwrap_err();

        let lines: Vec<Option<usize>> = err.diagnostics().iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![Some(2), Some(1), Some(3)]);
    }

    #[test]
    fn test_interpreter_17_globals_persist_between_runs() {
        let (mut runner, buffer) = runner();

        runner.run("var a = 1; fun inc() { a = a + 1; }").unwrap();
        runner.run("inc(); print a;").unwrap();

        assert_eq!(buffer.lines(), vec!["2"]);

        let err: RunError = runner.run("var a = 3;").unwrap_err();
        assert_eq!(err.exit_code(), EXIT_RUNTIME);

        runner.run("print a;").unwrap();
        assert_eq!(buffer.lines(), vec!["2", "2"]);
    }

    #[test]
    fn test_interpreter_18_recursion() {
        let source = "
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(15);
        ";

        assert_eq!(output(source), vec!["610"]);
    }

    #[test]
    fn test_interpreter_19_scope_restored_after_runtime_error() {
        let (mut runner, buffer) = runner();

        assert!(runner.run("{ var t = 1; print nope; }").is_err());
        runner.run("var t = 2; print t;").unwrap();

        assert!(runner
            .run("fun boom() { var u = 1; print nope; } boom();")
            .is_err());
        runner.run("var u = 3; print u;").unwrap();

        assert_eq!(buffer.lines(), vec!["2", "3"]);
    }
}
